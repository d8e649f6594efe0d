//! Field-level validation rules shared by employees and experiment notes.
//!
//! Every check is a pure function. Violations are collected into
//! [`FieldErrors`] so a single response can report all offending fields.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{ALLOWED_IMAGE_EXTENSIONS, MAX_IMAGE_SIZE_BYTES, MAX_PHONE_LENGTH};
use crate::errors::{AppError, AppResult};

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// `+7`, `7` or `8` followed by ten digits.
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+7|7|8)[0-9]{10}$").expect("phone pattern is a valid regex"));

/// Validation messages grouped by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single message for a single field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Record the outcome of a check under `field`.
    pub fn check(&mut self, field: &str, outcome: Result<(), String>) {
        if let Err(message) = outcome {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<&validator::ValidationErrors> for FieldErrors {
    fn from(errors: &validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

/// Russian-style phone number, at most twelve characters.
pub fn check_phone(phone: &str) -> Result<(), String> {
    if phone.chars().count() > MAX_PHONE_LENGTH || !PHONE_PATTERN.is_match(phone) {
        return Err(
            "Phone number must be entered in the format +7XXXXXXXXXX, 7XXXXXXXXXX or 8XXXXXXXXXX"
                .to_string(),
        );
    }
    Ok(())
}

/// Checks an uploaded image and returns its canonical (lowercase) extension.
pub fn check_image(file_name: &str, size: u64) -> Result<String, String> {
    if size > MAX_IMAGE_SIZE_BYTES {
        return Err(format!(
            "File size must not exceed {} MB",
            MAX_IMAGE_SIZE_BYTES / (1024 * 1024)
        ));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(format!(
            "Unsupported file extension, allowed: {}",
            ALLOWED_IMAGE_EXTENSIONS.join(", ")
        ));
    }

    Ok(extension)
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Validate against the image rules, reporting under `field`.
    pub fn extension_for(&self, field: &str) -> AppResult<String> {
        check_image(&self.file_name, self.bytes.len() as u64)
            .map_err(|message| AppError::invalid_field(field, message))
    }
}

/// Inclusive range check with at most two fractional digits.
pub fn check_decimal(value: Decimal, min: Decimal, max: Decimal) -> Result<(), String> {
    if value.normalize().scale() > 2 {
        return Err("Ensure that there are no more than 2 decimal places".to_string());
    }
    if value < min {
        return Err(format!("Ensure this value is greater than or equal to {}", min));
    }
    if value > max {
        return Err(format!("Ensure this value is less than or equal to {}", max));
    }
    Ok(())
}

/// Non-blank text no longer than `max` characters.
pub fn check_text(value: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("This field may not be blank".to_string());
    }
    if value.chars().count() > max {
        return Err(format!("Ensure this field has no more than {} characters", max));
    }
    Ok(())
}

/// Lowercases the domain part of an address, leaving the local part intact.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
