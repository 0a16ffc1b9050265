use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    config::{GenerationProfile, ImagenConfig, RetryConfig},
    error::{ImagenError, Result},
    generation_event,
    logger::{self, LogLevel},
    models::{
        decode_image, extract_image_payloads, image_output_path, GenerationOutcome,
        GenerationRequest, Scene,
    },
};

use super::{retry::with_retry, transport::HttpTransport, ImageTransport};

#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<dyn ImageTransport>,
    profile: GenerationProfile,
    retry: RetryConfig,
}

impl ImageClient {
    pub fn new(config: &ImagenConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.credentials.clone(), config.timeout)?;
        log::info!("📡 Using image API at: {}", transport.endpoint());

        Ok(Self::with_transport(
            Arc::new(transport),
            config.profile.clone(),
            config.retry.clone(),
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn ImageTransport>,
        profile: GenerationProfile,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            profile,
            retry,
        }
    }

    pub fn profile(&self) -> &GenerationProfile {
        &self.profile
    }

    pub fn build_request(&self, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            model: self.profile.model.clone(),
            prompt: prompt.to_string(),
            image_count: self.profile.image_count,
            response_format: self.profile.response_format,
        }
    }

    /// Generate images for `prompt` and save them at `output_path`.
    ///
    /// Returns `true` only when every returned image was written and found on
    /// disk with a non-zero size. Failures are logged and never propagated.
    pub async fn generate_and_save(&self, prompt: &str, output_path: impl AsRef<Path>) -> bool {
        let output_path = output_path.as_ref();
        let scene = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        !self.save_images(&scene, prompt, output_path).await.is_empty()
    }

    pub async fn generate_scene(&self, scene: &Scene, output_path: impl AsRef<Path>) -> bool {
        !self
            .save_images(&scene.id, &scene.prompt, output_path.as_ref())
            .await
            .is_empty()
    }

    /// Logged form of [`generate`](Self::generate): the saved paths, or none
    /// after a failure has been reported under `scene`.
    pub async fn save_images(&self, scene: &str, prompt: &str, output_path: &Path) -> Vec<PathBuf> {
        logger::record(
            generation_event!(
                LogLevel::Info,
                scene,
                GenerationOutcome::Started,
                format!("🎨 Generating image for '{}'", output_path.display()),
            )
            .with_context("prompt", prompt)
            .with_context("model", self.profile.model.as_str())
            .with_context("n", self.profile.image_count),
        );

        let started = Instant::now();
        match self.generate(scene, prompt, output_path).await {
            Ok(paths) => {
                let files: Vec<Value> = paths
                    .iter()
                    .map(|p| Value::String(p.display().to_string()))
                    .collect();
                logger::record(
                    generation_event!(
                        LogLevel::Info,
                        scene,
                        GenerationOutcome::Saved,
                        format!("✅ Image downloaded successfully ({} file(s))", paths.len()),
                    )
                    .with_context("files", files)
                    .with_duration(started.elapsed()),
                );
                paths
            }
            Err(e) => {
                report_failure(scene, &e);
                Vec::new()
            }
        }
    }

    /// The fallible core of [`generate_and_save`](Self::generate_and_save):
    /// request, extract, decode, write and verify. Returns the saved paths.
    pub async fn generate(
        &self,
        scene: &str,
        prompt: &str,
        output_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        if prompt.trim().is_empty() {
            return Err(ImagenError::Config("prompt must not be empty".into()));
        }
        if self.profile.image_count == 0 {
            return Err(ImagenError::Config("image count must be at least one".into()));
        }

        let request = self.build_request(prompt);
        let transport = &self.transport;
        let pending = &request;
        let body = with_retry(&self.retry, scene, move || transport.send(pending)).await?;

        let payloads = extract_image_payloads(&body, request.image_count as usize)?;
        if payloads.len() < request.image_count as usize {
            log::warn!(
                "⚠️  [{}] provider returned {} of {} requested images",
                scene,
                payloads.len(),
                request.image_count
            );
        }

        // Decode everything first so a bad payload leaves no files behind.
        let images = payloads
            .iter()
            .map(|b64| decode_image(b64))
            .collect::<Result<Vec<_>>>()?;

        let mut saved = Vec::with_capacity(images.len());
        for (index, bytes) in images.iter().enumerate() {
            let path = image_output_path(output_path, index, request.image_count);
            save_verified(&path, bytes).await?;
            log::debug!("💾 Image saved to: {}", path.display());
            saved.push(path);
        }

        if saved.is_empty() {
            return Err(ImagenError::ResponseShape { body });
        }
        Ok(saved)
    }
}

/// Write `bytes` and confirm the file exists with a non-zero size.
async fn save_verified(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ImagenError::Persistence {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(ImagenError::Persistence {
            path: path.to_path_buf(),
            message: "file is empty".into(),
        }),
        Err(e) => Err(ImagenError::Persistence {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn report_failure(scene: &str, error: &ImagenError) {
    let outcome = error.outcome();
    let entry = match error {
        ImagenError::Transport {
            message,
            status,
            body,
        } => {
            let mut entry = generation_event!(
                LogLevel::Error,
                scene,
                outcome,
                format!("❌ An error occurred: {}", message),
            );
            if let Some(status) = status {
                entry = entry.with_context("status", *status);
            }
            entry.with_context(
                "body",
                body.clone().unwrap_or_else(|| "No response".to_string()),
            )
        }
        ImagenError::ResponseShape { body } => generation_event!(
            LogLevel::Error,
            scene,
            outcome,
            "❌ API response did not contain image data.",
        )
        .with_context(
            "response",
            serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.clone())),
        ),
        ImagenError::Persistence { path, message } => generation_event!(
            LogLevel::Error,
            scene,
            outcome,
            format!("❌ Download failed or file is empty: {}", message),
        )
        .with_context("path", path.display().to_string()),
        ImagenError::Parse(_) | ImagenError::Serialization(_) => generation_event!(
            LogLevel::Error,
            scene,
            outcome,
            format!("❌ {}", error),
        ),
        ImagenError::Config(_) | ImagenError::Io(_) => {
            generation_event!(LogLevel::Error, scene, outcome, format!("❌ {}", error))
        }
    };
    logger::record(entry);
}
