use datasentinel_core::AppError;

/// Errors raised by the processing engines
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to parse {format} data: {message}")]
    Parse { format: String, message: String },

    #[error("Failed to serialize {format} data: {message}")]
    Serialize { format: String, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid validation rules: {0}")]
    InvalidRules(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

impl ProcessingError {
    pub(crate) fn parse(format: impl Into<String>, message: impl ToString) -> Self {
        ProcessingError::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn serialize(format: impl Into<String>, message: impl ToString) -> Self {
        ProcessingError::Serialize {
            format: format.into(),
            message: message.to_string(),
        }
    }
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::UnsupportedFormat(msg) => AppError::UnsupportedFormat(msg),
            ProcessingError::Serialize { .. } => AppError::Processing(err.to_string()),
            ProcessingError::Parse { .. }
            | ProcessingError::ColumnNotFound(_)
            | ProcessingError::InvalidRules(_)
            | ProcessingError::InvalidInput(_) => AppError::InvalidInput(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasentinel_core::ErrorMetadata;

    #[test]
    fn test_processing_error_status_codes() {
        let err: AppError = ProcessingError::ColumnNotFound("label".to_string()).into();
        assert_eq!(err.http_status_code(), 400);

        let err: AppError = ProcessingError::UnsupportedFormat("excel".to_string()).into();
        assert_eq!(err.http_status_code(), 415);

        let err: AppError = ProcessingError::serialize("csv", "broken pipe").into();
        assert_eq!(err.http_status_code(), 422);
    }
}
