use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::models::GenerationOutcome;

pub const ENV_LOG_JSON: &str = "IMAGEN_LOG_JSON";
pub const ENV_LOG_FILE: &str = "IMAGEN_LOG_FILE";

static LOGGER: Lazy<ImagenLogger> = Lazy::new(ImagenLogger::new);
static INSTALLED: OnceCell<bool> = OnceCell::new();

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

/// Install the logger behind the `log` facade. Calling it again only swaps
/// the configuration.
pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    LOGGER.update_config(config)?;
    install_once(&INSTALLED, || log::set_logger(&*LOGGER).is_ok())?;
    log::set_max_level(max_level);
    Ok(())
}

/// Runs `install` at most once per cell. A failed install stays failed.
fn install_once(cell: &OnceCell<bool>, install: impl FnOnce() -> bool) -> Result<(), String> {
    if *cell.get_or_init(install) {
        Ok(())
    } else {
        Err("Failed to set logger: another logger is already installed".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_log_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_level_filter(&self) -> log::LevelFilter {
        self.to_log_level().to_level_filter()
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// One log line. Generation events also carry the scene they belong to and
/// their outcome, so failures can be filtered without parsing messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GenerationOutcome>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            module,
            file,
            line,
            scene: None,
            outcome: None,
            context: BTreeMap::new(),
            duration_ms: None,
        }
    }

    pub fn with_scene(mut self, scene: &str) -> Self {
        self.scene = Some(scene.to_string());
        self
    }

    pub fn with_outcome(mut self, outcome: GenerationOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    /// The message with its scene tag and context, for loggers that only
    /// take a line of text.
    pub fn tagged_message(&self) -> String {
        let mut message = match &self.scene {
            Some(scene) => {
                let outcome = self.outcome.map(|o| o.as_str()).unwrap_or("-");
                format!("[{} {}] {}", scene, outcome, self.message)
            }
            None => self.message.clone(),
        };
        if !self.context.is_empty() {
            message.push(' ');
            message.push_str(&serde_json::to_string(&self.context).unwrap_or_default());
        }
        message
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_to_file: bool,
    pub log_file_path: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: false,
            show_module: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_to_file: false,
            log_file_path: "rgen-imagen.log".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults adjusted by `IMAGEN_LOG_JSON` and `IMAGEN_LOG_FILE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if env::var(ENV_LOG_JSON).map_or(false, |v| v == "true" || v == "1") {
            config = config.with_json_output(true);
        }
        if let Ok(path) = env::var(ENV_LOG_FILE) {
            if !path.trim().is_empty() {
                config = config.with_file_output(path.trim());
            }
        }
        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_to_file = true;
        self.log_file_path = path.to_string();
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        if enabled {
            self.show_colors = false;
            self.show_emojis = false;
        }
        self
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_file_location: true,
            ..Default::default()
        }
    }
}

pub struct ImagenLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
    capture: AtomicBool,
    captured: Mutex<Vec<LogEntry>>,
}

impl ImagenLogger {
    fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
            capture: AtomicBool::new(false),
            captured: Mutex::new(Vec::new()),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) -> Result<(), String> {
        let file = if new_config.log_to_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&new_config.log_file_path)
                .map_err(|e| {
                    format!(
                        "Failed to open log file '{}': {}",
                        new_config.log_file_path, e
                    )
                })?;
            Some(file)
        } else {
            None
        };

        if let Ok(mut log_file) = self.log_file.lock() {
            *log_file = file;
        }
        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
        Ok(())
    }

    fn format_console_output(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let mut output = String::new();

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if config.show_colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level_str = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if config.show_colors {
            output.push_str(&format!(
                "[{}] ",
                level_str.color(entry.level.color()).bold()
            ));
        } else {
            output.push_str(&format!("[{}] ", level_str));
        }

        if config.show_module && !entry.module.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}: ", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.module));
            }
        }

        if let Some(scene) = &entry.scene {
            let outcome = entry.outcome.map(|o| o.as_str()).unwrap_or("-");
            let tag = format!("[{} {}] ", scene, outcome);
            if config.show_colors {
                output.push_str(&tag.bright_yellow().to_string());
            } else {
                output.push_str(&tag);
            }
        }

        if config.show_colors {
            output.push_str(&entry.message.white().bold().to_string());
        } else {
            output.push_str(&entry.message);
        }

        if !entry.context.is_empty() {
            let context = serde_json::to_string(&entry.context).unwrap_or_default();
            output.push(' ');
            if config.show_colors {
                output.push_str(&context.bright_cyan().to_string());
            } else {
                output.push_str(&context);
            }
        }

        if let Some(duration) = entry.duration_ms {
            if config.show_colors {
                output.push_str(&format!(" [{}ms]", duration.to_string().bright_magenta()));
            } else {
                output.push_str(&format!(" [{}ms]", duration));
            }
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn write_to_file(&self, entry: &LogEntry, config: &LoggerConfig) {
        if let Ok(mut log_file_guard) = self.log_file.lock() {
            if let Some(ref mut file) = *log_file_guard {
                let content = if config.output_json {
                    serde_json::to_string(entry).unwrap_or_default()
                } else {
                    let plain = LoggerConfig {
                        show_colors: false,
                        ..config.clone()
                    };
                    self.format_console_output(entry, &plain)
                };
                let _ = writeln!(file, "{}", content);
                let _ = file.flush();
            }
        }
    }

    fn capture_event(&self, entry: &LogEntry) {
        if self.capture.load(Ordering::SeqCst) && entry.scene.is_some() {
            if let Ok(mut captured) = self.captured.lock() {
                captured.push(entry.clone());
            }
        }
    }

    fn emit(&self, entry: LogEntry) {
        let config = match self.config.lock() {
            Ok(config) => config.clone(),
            Err(_) => return,
        };
        if entry.level < config.min_level {
            return;
        }

        if config.output_json {
            println!("{}", serde_json::to_string(&entry).unwrap_or_default());
        } else {
            println!("{}", self.format_console_output(&entry, &config));
        }

        if config.log_to_file {
            self.write_to_file(&entry, &config);
        }
    }
}

impl log::Log for ImagenLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => metadata.level() <= config.min_level.to_log_level(),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.emit(LogEntry::new(
                LogLevel::from_log_level(record.level()),
                record.args().to_string(),
                record.module_path().unwrap_or("unknown").to_string(),
                record.file().unwrap_or("unknown").to_string(),
                record.line().unwrap_or(0),
            ));
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        if let Ok(mut log_file_guard) = self.log_file.lock() {
            if let Some(ref mut file) = *log_file_guard {
                let _ = file.flush();
            }
        }
    }
}

/// Start a structured generation event for a scene, stamped with the calling
/// module, file and line.
///
/// ```ignore
/// logger::record(generation_event!(LogLevel::Info, "scene_1", GenerationOutcome::Saved, "done"));
/// ```
#[macro_export]
macro_rules! generation_event {
    ($level:expr, $scene:expr, $outcome:expr, $message:expr $(,)?) => {
        $crate::logger::LogEntry::new(
            $level,
            ::std::convert::Into::<String>::into($message),
            module_path!().to_string(),
            file!().to_string(),
            line!(),
        )
        .with_scene($scene)
        .with_outcome($outcome)
    };
}

/// Hand a finished entry to the `log` facade. The current max level and the
/// installed logger's filter apply; with this crate's logger installed the
/// structured fields are kept, otherwise the entry is forwarded as a plain
/// record.
pub fn record(entry: LogEntry) {
    LOGGER.capture_event(&entry);
    dispatch(entry, log::max_level(), log::logger());
}

fn dispatch(entry: LogEntry, max_level: LevelFilter, target: &dyn log::Log) -> bool {
    let level = entry.level.to_log_level();
    let metadata = Metadata::builder()
        .level(level)
        .target(&entry.module)
        .build();
    if level > max_level || !target.enabled(&metadata) {
        return false;
    }

    let ours = &*LOGGER as *const ImagenLogger as *const u8;
    if std::ptr::eq(target as *const dyn log::Log as *const u8, ours) {
        LOGGER.emit(entry);
    } else {
        target.log(
            &Record::builder()
                .metadata(metadata)
                .args(format_args!("{}", entry.tagged_message()))
                .module_path(Some(entry.module.as_str()))
                .file(Some(entry.file.as_str()))
                .line(Some(entry.line))
                .build(),
        );
    }
    true
}

/// Keep every generation event in memory for later inspection.
pub fn enable_capture() {
    LOGGER.capture.store(true, Ordering::SeqCst);
}

/// Captured generation events for one scene, in emission order.
pub fn captured_for(scene: &str) -> Vec<LogEntry> {
    LOGGER
        .captured
        .lock()
        .map(|captured| {
            captured
                .iter()
                .filter(|e| e.scene.as_deref() == Some(scene))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
