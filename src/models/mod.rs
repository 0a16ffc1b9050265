pub mod image;
pub mod scene;

pub use image::*;
pub use scene::*;
