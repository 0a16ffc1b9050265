pub mod config;
pub mod error;
pub mod imagen;
pub mod logger;
pub mod models;
pub mod runner;

pub use config::{Credentials, GenerationProfile, ImagenConfig, ProfileKind, RetryConfig};
pub use error::{ImagenError, Result};
pub use imagen::{HttpTransport, ImageClient, ImageTransport};
pub use models::{GenerationOutcome, GenerationRequest, ResponseFormat, Scene, ScenePlan};
pub use runner::RunSummary;
