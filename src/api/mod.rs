/// Client for the remote segmentation/inpainting service.

pub mod client;
pub mod types;

pub use client::{ApiError, StudioApi};
