//! Package name validation
//!
//! The package name is substituted into the install command and into the
//! archive filename glob, so it must not carry glob metacharacters, path
//! separators or whitespace.

use crate::core::error::DeployError;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum accepted package name length
const MAX_NAME_LENGTH: usize = 128;

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._+-]*$").expect("package name pattern is valid")
});

/// Validator for package names
pub struct PackageNameValidator;

impl PackageNameValidator {
    /// Validate a package name.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::InvalidPackageName` naming the first rule violated.
    pub fn validate(name: &str) -> Result<(), DeployError> {
        let invalid = |reason: &str| DeployError::InvalidPackageName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("空の名前"));
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(invalid("128文字を超えています"));
        }

        if name.contains(['*', '?', '[', ']', '{', '}']) {
            return Err(invalid("glob のメタ文字を含んでいます"));
        }

        if name.contains(['/', '\\']) {
            return Err(invalid("パス区切り文字を含んでいます"));
        }

        if !NAME_REGEX.is_match(name) {
            return Err(invalid("使用できない文字を含んでいます"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["mypkg", "remixt", "py-opencv", "r_base", "libgcc-ng", "pkg.v2", "c++"] {
            assert!(
                PackageNameValidator::validate(name).is_ok(),
                "{} should be valid",
                name
            );
        }
    }

    #[test]
    fn test_empty_name() {
        assert!(matches!(
            PackageNameValidator::validate(""),
            Err(DeployError::InvalidPackageName { .. })
        ));
    }

    #[test]
    fn test_glob_metacharacters_rejected() {
        for name in ["my*", "pkg?", "pkg[1]", "{a,b}"] {
            match PackageNameValidator::validate(name) {
                Err(DeployError::InvalidPackageName { reason, .. }) => {
                    assert!(reason.contains("glob"), "{}: {}", name, reason)
                }
                other => panic!("{} should be rejected, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_path_separators_rejected() {
        assert!(PackageNameValidator::validate("../evil").is_err());
        assert!(PackageNameValidator::validate("a\\b").is_err());
    }

    #[test]
    fn test_leading_punctuation_and_whitespace_rejected() {
        assert!(PackageNameValidator::validate("-pkg").is_err());
        assert!(PackageNameValidator::validate(".pkg").is_err());
        assert!(PackageNameValidator::validate("my pkg").is_err());
    }

    #[test]
    fn test_overlong_name_rejected() {
        let name = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(PackageNameValidator::validate(&name).is_err());
        assert!(PackageNameValidator::validate(&"a".repeat(MAX_NAME_LENGTH)).is_ok());
    }
}
