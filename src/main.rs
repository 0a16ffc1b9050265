use clap::Parser;
use rgen_imagen::{
    logger::{self, LogLevel, LoggerConfig},
    runner::{self, RunSummary},
    ImageClient, ImagenConfig, ProfileKind, Result, ScenePlan,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Generate images for a set of scene prompts and save them as PNG files.
#[derive(Debug, Parser)]
#[command(name = "rgen-imagen", version)]
struct Args {
    /// Request shape: one image per scene, or one multi-scene batch call.
    #[arg(long, value_enum, default_value_t = ProfileKind::Scene)]
    profile: ProfileKind,

    /// Lyrics file the scene prompts are derived from.
    #[arg(long, default_value = "./lyrics.txt")]
    lyrics: PathBuf,

    /// JSON list of {"id", "prompt"} scenes, used instead of the lyrics.
    #[arg(long)]
    scenes: Option<PathBuf>,

    /// Prompt for the batch profile.
    #[arg(long)]
    prompt: Option<String>,

    /// Number of images per request.
    #[arg(long)]
    count: Option<u32>,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Pause between scene requests, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pause_ms: u64,

    /// Leave `response_format` out of the request body.
    #[arg(long)]
    no_response_format: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let mut logger_config = LoggerConfig::from_env();
    if args.verbose {
        logger_config = logger_config.with_level(LogLevel::Debug);
    }
    if let Err(e) = logger::init_with_config(logger_config) {
        eprintln!("{}", e);
        return ExitCode::from(2);
    }

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::debug!("No .env file found, using system environment variables");
    }

    match run(args).await {
        Ok(summary) if summary.all_successful() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            log::error!("❌ ERROR: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<RunSummary> {
    let mut config = ImagenConfig::from_env(args.profile)?;
    if let Some(count) = args.count {
        config.profile = config.profile.with_image_count(count);
    }
    if args.no_response_format {
        config.profile = config.profile.with_response_format(None);
    }

    log::info!(
        "🚀 Starting image generation ({:?} profile, model {}, {} image(s) per request)",
        args.profile,
        config.profile.model,
        config.profile.image_count
    );

    let scene_limit = config.profile.image_count as usize;
    let client = ImageClient::new(&config)?;
    let pause = Duration::from_millis(args.pause_ms);

    match args.profile {
        ProfileKind::Scene => match &args.scenes {
            Some(path) => {
                let plan = ScenePlan::load(path)?;
                runner::prepare_output_dir(&args.output_dir)?;
                Ok(runner::run_scenes(&client, &plan, &args.output_dir, pause).await)
            }
            None => runner::run_lyrics_flow(&client, &args.lyrics, &args.output_dir, pause).await,
        },
        ProfileKind::Batch => {
            let prompt = match args.prompt {
                Some(prompt) => prompt,
                None => {
                    let plan = match &args.scenes {
                        Some(path) => ScenePlan::load(path)?,
                        None => ScenePlan::builtin(),
                    };
                    plan.combined_prompt(scene_limit)
                }
            };
            runner::run_batch(&client, &prompt, &args.output_dir).await
        }
    }
}
