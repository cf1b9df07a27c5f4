//! Multipart upload helpers for the web pages

use axum::extract::Multipart;
use datasentinel_core::AppError;
use std::collections::HashMap;
use uuid::Uuid;

const UPLOAD_PREFIX: &str = "uploads/";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A parsed multipart form: file parts by field name plus the text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: HashMap<String, UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part of the form, rejecting any file over `max_size` bytes.
    pub async fn read(mut multipart: Multipart, max_size: usize) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
        {
            let name = field.name().map(|s| s.to_string()).unwrap_or_default();

            match field.file_name().map(|s| s.to_string()) {
                Some(filename) => {
                    if form.files.contains_key(&name) {
                        return Err(AppError::InvalidInput(format!(
                            "Multiple file fields named '{}' are not allowed",
                            name
                        )));
                    }
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    let data = field.bytes().await.map_err(|e| {
                        AppError::InvalidInput(format!("Failed to read file data: {}", e))
                    })?;
                    validate_file_size(data.len(), max_size)?;

                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            data: data.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        AppError::InvalidInput(format!("Failed to read field '{}': {}", name, e))
                    })?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Take a file part; browsers send an empty part when nothing was chosen.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files
            .remove(name)
            .filter(|file| !file.filename.is_empty() || !file.data.is_empty())
    }

    pub fn require_file(&mut self, name: &str) -> Result<UploadedFile, AppError> {
        self.take_file(name)
            .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require_field(&self, name: &str) -> Result<&str, AppError> {
        self.field(name)
            .ok_or_else(|| AppError::BadRequest(format!("Missing required field: {}", name)))
    }
}

/// Validate file size
pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}

/// Sanitize filename to prevent path traversal and invalid characters.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 200;

    let filename_only = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches('_').is_empty() {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}

/// `uploads/{uuid}_{filename}`
pub fn upload_key(filename: &str) -> Result<String, AppError> {
    Ok(format!(
        "{}{}_{}",
        UPLOAD_PREFIX,
        Uuid::new_v4(),
        sanitize_filename(filename)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("sales 2024.csv").unwrap(), "sales_2024.csv");
        assert_eq!(sanitize_filename("/tmp/data/a.json").unwrap(), "a.json");
        assert_eq!(sanitize_filename("C:\\data\\b.csv").unwrap(), "b.csv");
        assert_eq!(sanitize_filename("???").unwrap(), "file");
        assert!(sanitize_filename("..csv").is_err());
    }

    #[test]
    fn test_upload_key_layout() {
        let key = upload_key("my data.csv").unwrap();
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with("_my_data.csv"));
        assert_eq!(key.len(), "uploads/".len() + 36 + "_my_data.csv".len());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(10, 10).is_ok());
        assert!(matches!(
            validate_file_size(11, 10),
            Err(AppError::PayloadTooLarge(_))
        ));
    }
}
