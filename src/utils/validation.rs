use crate::utils::error::{QueryError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(QueryError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(QueryError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// The database path may be a file or SQLite's `:memory:` marker.
pub fn validate_database_path(field_name: &str, path: &str) -> Result<()> {
    if path == ":memory:" {
        return Ok(());
    }
    validate_path(field_name, path)
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    match std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(extension) if allowed_extensions.contains(&extension) => Ok(()),
        Some(extension) => Err(QueryError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(QueryError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_database_path() {
        assert!(validate_database_path("database.path", "students.db").is_ok());
        assert!(validate_database_path("database.path", ":memory:").is_ok());
        assert!(validate_database_path("database.path", "").is_err());
        assert!(validate_database_path("database.path", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("seed_csv", "students.csv", &["csv"]).is_ok());
        assert!(validate_file_extension("seed_csv", "students.tsv", &["csv"]).is_err());
        assert!(validate_file_extension("seed_csv", "students", &["csv"]).is_err());
    }
}
