//! Per-step validation rules for the order wizard.
//!
//! Pure and deterministic: re-running validation on an unchanged draft yields
//! identical results. Messages match what the submission endpoint returns so
//! client- and server-side rejections read the same.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{OrderDraft, ValidatedDraft};
use crate::workflow::Step;

/// Largest accepted reference image.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for the reference image.
pub const ACCEPTED_IMAGE_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/gif", "image/webp"];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());

/// Field name to human-readable messages, ordered by field name for stable
/// output. Matches the submission endpoint's `errors` wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Messages recorded for `field`; empty if the field validated.
    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Validate the fields owned by `step`. Other steps' fields are not checked;
/// only the active step's errors are ever surfaced.
pub fn validate_step(draft: &OrderDraft, step: Step) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    match step {
        Step::Contact => {
            if draft.name.trim().is_empty() {
                errors.push("name", "Name is required");
            }
            if draft.email.trim().is_empty() {
                errors.push("email", "Email is required");
            } else if !EMAIL.is_match(&draft.email) {
                errors.push("email", "Invalid email format");
            }
        }
        Step::SizeDetails => {
            // details is free text with no constraint
            if draft.size.is_none() {
                errors.push("size", "Size is required");
            }
        }
        Step::Photo => match &draft.reference_image {
            None => errors.push("photo", "Reference photo is required"),
            Some(image) if image.bytes.is_empty() => {
                errors.push("photo", "Reference photo is required");
            }
            Some(image) => {
                if image.bytes.len() > MAX_IMAGE_BYTES {
                    errors.push("photo", "File size must be less than 10MB");
                }
                if !ACCEPTED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
                    errors.push("photo", "Only .jpg, .png, .gif, and .webp formats are supported");
                }
            }
        },
        Step::Review => {}
    }
    errors.into_result()
}

/// Validate every collecting step in order. On success produces the
/// [`ValidatedDraft`] handed to the transport; on failure returns the first
/// offending step with its field errors.
pub fn validate_all(draft: &OrderDraft) -> Result<ValidatedDraft, (Step, FieldErrors)> {
    for step in Step::COLLECTING {
        if let Err(errors) = validate_step(draft, step) {
            return Err((step, errors));
        }
    }

    let (Some(size), Some(photo)) = (draft.size, draft.reference_image.as_ref()) else {
        // unreachable: the step checks above require both
        let mut errors = FieldErrors::default();
        errors.push("size", "Size is required");
        return Err((Step::SizeDetails, errors));
    };

    Ok(ValidatedDraft {
        name: draft.name.clone(),
        email: draft.email.clone(),
        size,
        details: draft.details.clone(),
        photo: photo.clone(),
    })
}
