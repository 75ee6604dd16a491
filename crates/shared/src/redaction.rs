//! Secret detection and redaction utilities.
//!
//! Keeps connection strings and provider API keys out of logs and error
//! metadata.

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

const SECRET_MARKERS: [&str; 6] = ["KEY", "TOKEN", "SECRET", "PASSWORD", "CREDENTIAL", "AUTH"];

/// Checks if a key/variable name likely refers to a secret.
///
/// # Examples
///
/// ```
/// use code_agent_shared::is_secret_key;
///
/// assert!(is_secret_key("CODE_AGENT_OPENAI_API_KEY"));
/// assert!(is_secret_key("password"));
/// assert!(!is_secret_key("agentName"));
/// ```
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    // Identifiers and token budgets (`maxTokens`) are not credentials.
    if key.ends_with("_ID") || key.ends_with("TOKENS") {
        return false;
    }
    SECRET_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Redacts a value if the key is likely a secret.
///
/// ```
/// use code_agent_shared::redact_if_secret;
///
/// assert_eq!(redact_if_secret("apiKey", "sk-123"), "[REDACTED]");
/// assert_eq!(redact_if_secret("branch", "main"), "main");
/// ```
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_owned()
    } else {
        value.to_owned()
    }
}

/// A secret string wrapper that redacts on Display/Debug.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_secret_patterns() {
        assert!(is_secret_key("OPENAI_API_KEY"));
        assert!(is_secret_key("refresh_token"));
        assert!(is_secret_key("CLIENT_SECRET"));
        assert!(is_secret_key("DB_PASSWORD"));
        assert!(is_secret_key("aws_credentials"));
        assert!(is_secret_key("basic_auth"));
    }

    #[test]
    fn identifiers_are_not_secrets() {
        assert!(!is_secret_key("LOG_LEVEL"));
        assert!(!is_secret_key("repositoryUrl"));
        assert!(!is_secret_key("KNOWLEDGE_BASE_ID"));
        assert!(!is_secret_key("agentId"));
        assert!(!is_secret_key("maxTokens"));
        assert!(!is_secret_key("CODE_AGENT_LOCAL_MAX_TOKENS"));
    }

    #[test]
    fn secret_string_redacts_display_and_debug() {
        let secret = SecretString::new("shh");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        assert_eq!(secret.expose(), "shh");
    }
}
