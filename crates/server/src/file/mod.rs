//! Uploaded image handling.
//!
//! Provides validation and resizing, naming, and storage of catalog images.

pub mod image;
pub mod service;
pub mod storage;

pub use image::{ImageError, MAX_DIMENSION, MAX_UPLOAD_SIZE, ProcessedImage, process_image};
pub use service::{MediaService, UploadError, unique_filename};
pub use storage::{FileStorage, LocalFileStorage};
