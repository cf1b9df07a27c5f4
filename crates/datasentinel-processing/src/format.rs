use crate::error::{ProcessingError, ProcessingResult};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

/// Tabular file formats the service recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Csv,
    Json,
    Excel,
    Parquet,
}

impl FileFormat {
    pub const ALL: [FileFormat; 4] = [
        FileFormat::Csv,
        FileFormat::Json,
        FileFormat::Excel,
        FileFormat::Parquet,
    ];

    /// Parse a format name (`csv`, `json`, `excel`, `parquet`).
    pub fn from_name(name: &str) -> ProcessingResult<Self> {
        FileFormat::ALL
            .into_iter()
            .find(|f| f.name() == name.trim().to_ascii_lowercase())
            .ok_or_else(|| ProcessingError::InvalidInput(format!("Unknown format: {}", name)))
    }

    /// Detect a format from a file name or storage key.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;

        match ext.as_str() {
            "csv" => Some(FileFormat::Csv),
            "json" => Some(FileFormat::Json),
            "xlsx" | "xls" => Some(FileFormat::Excel),
            "parquet" => Some(FileFormat::Parquet),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Excel => "excel",
            FileFormat::Parquet => "parquet",
        }
    }

    /// Canonical file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Excel => "xlsx",
            FileFormat::Parquet => "parquet",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Json => "application/json",
            FileFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            FileFormat::Parquet => "application/vnd.apache.parquet",
        }
    }

    /// Whether this build can read and write the format
    pub fn is_supported(&self) -> bool {
        matches!(self, FileFormat::Csv | FileFormat::Json | FileFormat::Parquet)
    }
}

impl FromStr for FileFormat {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileFormat::from_name(s)
    }
}

impl Display for FileFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(FileFormat::from_name("csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_name("EXCEL").unwrap(), FileFormat::Excel);
        assert!(FileFormat::from_name("xml").is_err());
    }

    #[test]
    fn test_from_path() {
        assert_eq!(FileFormat::from_path("raw/a.CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path("b.xls"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_path("c.parquet"), Some(FileFormat::Parquet));
        assert_eq!(FileFormat::from_path("notes.txt"), None);
        assert_eq!(FileFormat::from_path("no_extension"), None);
    }

    #[test]
    fn test_extension_and_support() {
        assert_eq!(FileFormat::Excel.extension(), "xlsx");
        assert!(FileFormat::Json.is_supported());
        assert!(FileFormat::Parquet.is_supported());
        assert!(!FileFormat::Excel.is_supported());
    }
}
