//! Secure token manager with memory-safe handling and masking capabilities
//!
//! This module provides secure handling of the upload token, using the
//! `secrecy` crate to prevent accidental token exposure in logs or memory dumps.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Default environment variable holding the upload token
pub const DEFAULT_TOKEN_VARIABLE: &str = "ANACONDA_TOKEN";

/// Masks a token for safe logging
///
/// Shows only the first 3 and last 3 characters for identification purposes.
/// Tokens shorter than 10 characters are fully masked as "****".
///
/// # Examples
///
/// ```
/// use package_deployer::security::token_manager::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Secure token manager for upload authentication
///
/// The environment is injected as a map; the CLI passes the process
/// environment.
///
/// # Examples
///
/// ```
/// use package_deployer::security::SecureTokenManager;
/// use std::collections::HashMap;
///
/// let env = HashMap::from([("ANACONDA_TOKEN".to_string(), "abcdef123456".to_string())]);
/// let manager = SecureTokenManager::new("ANACONDA_TOKEN", env);
/// assert_eq!(manager.masked_token().as_deref(), Some("abc...456"));
/// ```
pub struct SecureTokenManager {
    variable: String,
    env: HashMap<String, String>,
}

impl SecureTokenManager {
    /// Creates a manager reading `variable` from the given environment
    pub fn new(variable: impl Into<String>, env: HashMap<String, String>) -> Self {
        Self {
            variable: variable.into(),
            env,
        }
    }

    /// Name of the environment variable the token is read from
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Retrieves the token
    ///
    /// Returns `None` if the variable is unset, empty, or whitespace only.
    pub fn get_token(&self) -> Option<SecretString> {
        let value = self.env.get(&self.variable)?.trim();
        if value.is_empty() {
            return None;
        }
        Some(SecretString::new(value.into()))
    }

    /// Masked form of the current token, or `None` if unset
    pub fn masked_token(&self) -> Option<String> {
        self.get_token().map(|t| mask_token(t.expose_secret()))
    }

    /// Masks every occurrence of the token in a string
    ///
    /// Used on anything that may echo the command line back, such as error
    /// output captured from child processes.
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        match self.get_token() {
            Some(token) => {
                let token_str = token.expose_secret();
                text.replace(token_str, &mask_token(token_str))
            }
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(value: Option<&str>) -> SecureTokenManager {
        let mut env = HashMap::new();
        if let Some(value) = value {
            env.insert(DEFAULT_TOKEN_VARIABLE.to_string(), value.to_string());
        }
        SecureTokenManager::new(DEFAULT_TOKEN_VARIABLE, env)
    }

    #[test]
    fn test_get_token_returns_secret_when_set() {
        let manager = manager_with(Some("test-anaconda-token-12345"));
        let token = manager.get_token();
        assert!(token.is_some());
        assert_eq!(token.unwrap().expose_secret(), "test-anaconda-token-12345");
    }

    #[test]
    fn test_get_token_returns_none_when_unset() {
        let manager = manager_with(None);
        assert!(manager.get_token().is_none());
        assert!(manager.get_token().is_none());
    }

    #[test]
    fn test_empty_and_blank_tokens_count_as_missing() {
        for value in ["", " ", "\t\n", "   "] {
            let manager = manager_with(Some(value));
            assert!(manager.get_token().is_none(), "{:?} should not count as a token", value);
        }
    }

    #[test]
    fn test_token_is_trimmed() {
        let manager = manager_with(Some("  abcdef123456\n"));
        assert_eq!(manager.get_token().unwrap().expose_secret(), "abcdef123456");
    }

    #[test]
    fn test_other_variables_are_ignored() {
        let env = HashMap::from([("OTHER_TOKEN".to_string(), "abcdef123456".to_string())]);
        let manager = SecureTokenManager::new(DEFAULT_TOKEN_VARIABLE, env);
        assert!(manager.get_token().is_none());
        assert_eq!(manager.variable(), DEFAULT_TOKEN_VARIABLE);
    }

    #[test]
    fn test_mask_token_with_short_token() {
        assert_eq!(mask_token("short"), "****");
        assert_eq!(mask_token(""), "****");
    }

    #[test]
    fn test_mask_token_with_long_token() {
        assert_eq!(mask_token("abcdef123456"), "abc...456");
        assert_eq!(mask_token("very-long-token-string"), "ver...ing");
    }

    #[test]
    fn test_mask_token_with_multibyte_characters() {
        assert_eq!(mask_token("ああああああああああ"), "あああ...あああ");
    }

    #[test]
    fn test_masked_token() {
        assert_eq!(
            manager_with(Some("secret-token-12345")).masked_token(),
            Some("sec...345".to_string())
        );
        assert_eq!(manager_with(None).masked_token(), None);
    }

    #[test]
    fn test_mask_tokens_in_string_with_token() {
        let manager = manager_with(Some("secret-anaconda-token-12345"));
        let input = "anaconda -t secret-anaconda-token-12345 upload pkg.tar.bz2";
        let output = manager.mask_tokens_in_string(input);
        assert!(output.contains("sec...345"));
        assert!(!output.contains("secret-anaconda-token-12345"));
    }

    #[test]
    fn test_mask_tokens_in_string_no_token() {
        let manager = manager_with(None);
        let input = "This is a safe string with no tokens";
        assert_eq!(manager.mask_tokens_in_string(input), input);
    }
}
