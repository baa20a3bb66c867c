//! File and lock name validation.

use crate::{DirError, DirErrorKind, DirResult};

pub const MAX_NAME_LEN: usize = 255;

/// Checks that `name` addresses a single entry inside a directory.
pub fn validate_name(name: &str, context: &'static str) -> DirResult<()> {
    if name.is_empty() {
        return Err(DirError::with_detail(
            DirErrorKind::InvalidInput,
            context,
            "empty name",
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(DirError::with_detail(
            DirErrorKind::InvalidInput,
            context,
            format!("name longer than {MAX_NAME_LEN} bytes"),
        ));
    }
    if name == "." || name == ".." {
        return Err(DirError::with_detail(
            DirErrorKind::InvalidInput,
            context,
            format!("reserved name {name:?}"),
        ));
    }
    if name.bytes().any(|b| matches!(b, b'/' | b'\\' | 0)) {
        return Err(DirError::with_detail(
            DirErrorKind::InvalidInput,
            context,
            format!("name {name:?} contains a separator or NUL"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["segments_1", "_0.cfs", "write.lock", "a"] {
            validate_name(name, "test").expect("valid name");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        for name in ["", ".", "..", "a/b", "a\\b", "a\0b", long.as_str()] {
            let err = validate_name(name, "test").expect_err("invalid name");
            assert_eq!(err.kind(), DirErrorKind::InvalidInput);
        }
    }
}
