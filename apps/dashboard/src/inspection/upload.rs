//! Uploaded curriculum document and year group, validated before anything is
//! sent to the backend.

use bytes::Bytes;

use crate::errors::AppError;

pub const YEAR_GROUPS: [&str; 6] = ["Year 1", "Year 2", "Year 3", "Year 4", "Year 5", "Year 6"];

pub const ACCEPTED_EXTENSIONS: [&str; 7] =
    [".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx"];

const YEAR_PREFIX: &str = "Year ";

/// A document ready to forward to the backend.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    /// Numeric year group, e.g. `3` for "Year 3".
    pub year_group: u8,
}

impl DocumentUpload {
    pub fn new(
        file_name: String,
        content_type: Option<String>,
        bytes: Bytes,
        year_group_label: &str,
    ) -> Result<Self, AppError> {
        check_extension(&file_name)?;
        if bytes.is_empty() {
            return Err(AppError::Validation(format!("{file_name} is empty")));
        }
        Ok(Self {
            year_group: parse_year_group(year_group_label)?,
            file_name,
            content_type,
            bytes,
        })
    }

    pub fn size_kb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }
}

/// "Year 4" -> 4. Only the labels in `YEAR_GROUPS` are accepted.
pub fn parse_year_group(label: &str) -> Result<u8, AppError> {
    let label = label.trim();
    if !YEAR_GROUPS.contains(&label) {
        return Err(AppError::Validation(format!(
            "Unknown year group '{label}'. Expected one of: {}",
            YEAR_GROUPS.join(", ")
        )));
    }
    label[YEAR_PREFIX.len()..]
        .parse::<u8>()
        .map_err(|_| AppError::Validation(format!("Unknown year group '{label}'")))
}

fn check_extension(file_name: &str) -> Result<(), AppError> {
    let lower = file_name.to_ascii_lowercase();
    if ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Unsupported file type '{file_name}'. Accepted: {}",
            ACCEPTED_EXTENSIONS.join(",")
        )))
    }
}
