use std::path::{Component, Path};

use crate::TransferError;

/// Checks that a folder id or file name stays inside its parent when
/// joined onto a local root.
///
/// Rejects empty names, NUL bytes, absolute paths, `..` components and
/// Windows prefixes. `.` components are harmless and allowed.
pub fn validate_target_path(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }
    if name.contains('\0') {
        return Err(TransferError::InvalidPath(format!("NUL byte in {name:?}")));
    }

    let path = Path::new(name);
    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!("absolute path: {name}")));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent traversal: {name}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!("absolute path: {name}")));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_nested_names() {
        assert!(validate_target_path("test.zip").is_ok());
        assert!(validate_target_path("0").is_ok());
        assert!(validate_target_path("team/reports/q3.pdf").is_ok());
        assert!(validate_target_path("./test.zip").is_ok());
        assert!(validate_target_path(".hidden").is_ok());
    }

    #[test]
    fn rejects_empty_and_nul() {
        assert!(validate_target_path("").is_err());
        assert!(validate_target_path("a\0b").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_target_path("..").is_err());
        assert!(validate_target_path("../escape.zip").is_err());
        assert!(validate_target_path("sub/../../escape").is_err());
    }

    #[test]
    fn rejects_absolute() {
        assert!(matches!(
            validate_target_path("/etc/passwd"),
            Err(TransferError::InvalidPath(_))
        ));
    }
}
