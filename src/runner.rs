use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::{
    error::{ImagenError, Result},
    imagen::ImageClient,
    models::ScenePlan,
};

pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);
pub const BATCH_OUTPUT_NAME: &str = "generated_image";

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Generation requests made, one per scene or one for a batch.
    pub attempted: usize,
    pub succeeded: usize,
    pub images_saved: usize,
    pub failed: Vec<String>,
}

impl RunSummary {
    /// A request with no saved image counts as failed.
    pub fn record(&mut self, id: &str, images_saved: usize) {
        self.attempted += 1;
        if images_saved > 0 {
            self.succeeded += 1;
            self.images_saved += images_saved;
        } else {
            self.failed.push(id.to_string());
        }
    }

    /// True only if something was attempted and nothing failed.
    pub fn all_successful(&self) -> bool {
        self.attempted > 0 && self.failed.is_empty()
    }

    pub fn log(&self) {
        log::info!("{}", "=".repeat(60));
        if self.all_successful() {
            log::info!(
                "🎉 SUCCESS! All {} request(s) succeeded, {} image(s) saved!",
                self.attempted,
                self.images_saved
            );
        } else {
            log::error!(
                "❌ FAILED! {} of {} request(s) produced no image: {}",
                self.attempted - self.succeeded,
                self.attempted,
                self.failed.join(", ")
            );
        }
        log::info!("{}", "=".repeat(60));
    }
}

pub fn load_lyrics(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let lyrics = fs::read_to_string(path).map_err(|e| {
        ImagenError::Config(format!(
            "Lyrics file not found at '{}' ({}). Please check the path.",
            path.display(),
            e
        ))
    })?;
    log::info!("✅ Successfully loaded lyrics from '{}'", path.display());
    Ok(lyrics)
}

pub fn prepare_output_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| {
        ImagenError::Config(format!(
            "could not create output directory '{}': {}",
            dir.display(),
            e
        ))
    })
}

/// Render every scene in order, one call at a time, pausing between calls.
/// A failed scene is logged by the client and the loop moves on.
pub async fn run_scenes(
    client: &ImageClient,
    plan: &ScenePlan,
    output_dir: &Path,
    pause: Duration,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for (index, scene) in plan.iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let output_path = output_dir.join(scene.file_name());
        let saved = client
            .save_images(&scene.id, &scene.prompt, &output_path)
            .await;
        summary.record(&scene.id, saved.len());
    }

    summary.log();
    summary
}

/// Scene flow: the lyrics file must be readable before any request is sent.
pub async fn run_lyrics_flow(
    client: &ImageClient,
    lyrics_path: &Path,
    output_dir: &Path,
    pause: Duration,
) -> Result<RunSummary> {
    let lyrics = load_lyrics(lyrics_path)?;
    let plan = ScenePlan::from_lyrics(&lyrics);
    prepare_output_dir(output_dir)?;
    Ok(run_scenes(client, &plan, output_dir, pause).await)
}

/// Batch flow: one prompt, `image_count` images from a single call, saved as
/// `generated_image[_{i}].png`.
pub async fn run_batch(
    client: &ImageClient,
    prompt: &str,
    output_dir: &Path,
) -> Result<RunSummary> {
    prepare_output_dir(output_dir)?;

    let output_path = output_dir.join(format!("{}.png", BATCH_OUTPUT_NAME));
    let mut summary = RunSummary::default();
    let saved = client
        .save_images(BATCH_OUTPUT_NAME, prompt, &output_path)
        .await;
    summary.record(BATCH_OUTPUT_NAME, saved.len());

    summary.log();
    Ok(summary)
}
