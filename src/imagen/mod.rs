pub mod image_client;
pub mod retry;
pub mod transport;

pub use image_client::ImageClient;
pub use retry::with_retry;
pub use transport::{HttpTransport, ImageTransport};

#[cfg(test)]
pub(crate) mod testing;
