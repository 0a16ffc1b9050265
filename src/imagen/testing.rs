//! Scripted transport shared by the unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::ImageTransport;
use crate::{
    error::{ImagenError, Result},
    models::GenerationRequest,
};

/// A 1x1 PNG.
pub const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Replays canned results in order and records every request it sees.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String>>>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageTransport for ScriptedTransport {
    async fn send(&self, request: &GenerationRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ImagenError::transport("no scripted reply left")))
    }
}

/// A 2xx body with `entries` copies of [`PIXEL_PNG`].
pub fn data(entries: usize) -> Result<String> {
    let data: Vec<Value> = (0..entries)
        .map(|_| json!({ "b64_json": PIXEL_PNG }))
        .collect();
    Ok(json!({ "data": data }).to_string())
}

pub fn http_error(status: u16, body: &str) -> Result<String> {
    Err(ImagenError::Transport {
        message: format!("image API returned {}", status),
        status: Some(status),
        body: Some(body.to_string()),
    })
}
