//! Object key helpers shared by all backends.

use crate::{StorageError, StorageResult};

/// Reject keys that could escape the bucket or storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.starts_with('/') || storage_key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Last path segment of a key (`raw/2024/sales.csv` -> `sales.csv`).
pub fn file_name(storage_key: &str) -> &str {
    storage_key.rsplit('/').next().unwrap_or(storage_key)
}

/// Key without its final extension (`raw/sales.csv` -> `raw/sales`).
pub fn strip_extension(storage_key: &str) -> &str {
    let name = file_name(storage_key);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &storage_key[..storage_key.len() - (name.len() - idx)],
        _ => storage_key,
    }
}

/// Directory part of a key, without trailing slash (`a/b/c.csv` -> `a/b`).
pub fn parent(storage_key: &str) -> &str {
    match storage_key.rfind('/') {
        Some(idx) => &storage_key[..idx],
        None => "",
    }
}

/// Lower-cased extension of a key, if any.
pub fn extension(storage_key: &str) -> Option<String> {
    let name = file_name(storage_key);
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx + 1..].to_lowercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("raw/sales.csv").is_ok());
        assert!(validate_key("raw/..hidden.csv").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("raw/../../etc/passwd").is_err());
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(file_name("raw/2024/sales.csv"), "sales.csv");
        assert_eq!(file_name("sales.csv"), "sales.csv");
        assert_eq!(strip_extension("raw/sales.v2.csv"), "raw/sales.v2");
        assert_eq!(strip_extension("raw/.env"), "raw/.env");
        assert_eq!(strip_extension("raw.d/README"), "raw.d/README");
        assert_eq!(parent("scaled/run1/data.csv"), "scaled/run1");
        assert_eq!(parent("data.csv"), "");
        assert_eq!(extension("raw/Sales.CSV").as_deref(), Some("csv"));
        assert_eq!(extension("raw/noext"), None);
    }
}
