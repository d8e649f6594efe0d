//! Request extractors that decode and validate input once at the boundary.

mod image_file;
mod validated_json;

pub use image_file::ImageFile;
pub use validated_json::ValidatedJson;
