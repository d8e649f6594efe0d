//! Multipart extractor for a single uploaded image.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
};

use crate::domain::ImageUpload;
use crate::errors::AppError;

/// The first file part of a multipart form.
///
/// Size and extension rules are applied by the services, which know the
/// field the image belongs to.
pub struct ImageFile(pub ImageUpload);

#[async_trait]
impl<S> FromRequest<S> for ImageFile
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(ImageFile(ImageUpload::new(file_name, bytes.to_vec())));
        }

        Err(AppError::invalid_field("file", "No file was submitted"))
    }
}
