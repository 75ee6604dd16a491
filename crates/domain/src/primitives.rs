//! Domain primitives with validated constructors.

use crate::provider::AiProvider;
use code_agent_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum length of an agent identifier.
pub const MAX_AGENT_ID_LEN: usize = 128;
/// Maximum length of an agent display name.
pub const MAX_AGENT_NAME_LEN: usize = 256;
/// Branch used when a request does not name one.
pub const DEFAULT_BRANCH: &str = "main";

const VECTOR_TABLE_PREFIX: &str = "agent_kb_";
const MAX_VECTOR_TABLE_LEN: usize = 63;
const REPOSITORY_SCHEMES: [&str; 5] = ["https://", "http://", "ssh://", "git://", "file://"];

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `AgentId` is empty, too long, or contains disallowed characters.
    InvalidAgentId {
        /// Trimmed input that failed validation.
        input: String,
        /// Which rule was violated.
        reason: &'static str,
    },
    /// `AgentName` is empty or too long.
    InvalidAgentName {
        /// Length of the raw input.
        input_length: usize,
    },
    /// `AgentVersion` is empty after trimming.
    InvalidAgentVersion {
        /// Length of the raw input.
        input_length: usize,
    },
    /// `KnowledgeBaseId` is empty after trimming.
    InvalidKnowledgeBaseId {
        /// Length of the raw input.
        input_length: usize,
    },
    /// `DataSourceId` is empty after trimming.
    InvalidDataSourceId {
        /// Length of the raw input.
        input_length: usize,
    },
    /// `HostedAgentId` is empty after trimming.
    InvalidHostedAgentId {
        /// Length of the raw input.
        input_length: usize,
    },
    /// `RepositoryUrl` is not a recognizable clone URL.
    InvalidRepositoryUrl {
        /// Trimmed input that failed validation.
        input: String,
    },
    /// `BranchName` is empty or not a safe ref name.
    InvalidBranchName {
        /// Trimmed input that failed validation.
        input: String,
    },
    /// `VectorTableName` violates `^[a-z][a-z0-9_]{0,62}$`.
    InvalidVectorTableName {
        /// Trimmed input that failed validation.
        input: String,
    },
    /// Derived vector table name is invalid (invariant violation).
    DerivedVectorTableNameInvalid {
        /// Candidate that failed validation.
        candidate: String,
    },
    /// Derived checkout key is invalid (invariant violation).
    DerivedCheckoutKeyInvalid {
        /// Candidate that failed validation.
        candidate: String,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::InvalidAgentId { .. } => "invalid_agent_id",
            Self::InvalidAgentName { .. } => "invalid_agent_name",
            Self::InvalidAgentVersion { .. } => "invalid_agent_version",
            Self::InvalidKnowledgeBaseId { .. } => "invalid_knowledge_base_id",
            Self::InvalidDataSourceId { .. } => "invalid_data_source_id",
            Self::InvalidHostedAgentId { .. } => "invalid_hosted_agent_id",
            Self::InvalidRepositoryUrl { .. } => "invalid_repository_url",
            Self::InvalidBranchName { .. } => "invalid_branch",
            Self::InvalidVectorTableName { .. } | Self::DerivedVectorTableNameInvalid { .. } => {
                "invalid_vector_table_name"
            },
            Self::DerivedCheckoutKeyInvalid { .. } => "invalid_checkout_key",
        };
        ErrorCode::new("domain", code)
    }

    const fn is_invariant(&self) -> bool {
        matches!(
            self,
            Self::DerivedVectorTableNameInvalid { .. } | Self::DerivedCheckoutKeyInvalid { .. }
        )
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAgentId { reason, .. } => write!(formatter, "AgentId {reason}"),
            Self::InvalidAgentName { .. } => write!(
                formatter,
                "AgentName must be non-empty and at most {MAX_AGENT_NAME_LEN} characters"
            ),
            Self::InvalidAgentVersion { .. } => {
                formatter.write_str("AgentVersion must be non-empty")
            },
            Self::InvalidKnowledgeBaseId { .. } => {
                formatter.write_str("KnowledgeBaseId must be non-empty")
            },
            Self::InvalidDataSourceId { .. } => {
                formatter.write_str("DataSourceId must be non-empty")
            },
            Self::InvalidHostedAgentId { .. } => {
                formatter.write_str("HostedAgentId must be non-empty")
            },
            Self::InvalidRepositoryUrl { .. } => formatter.write_str(
                "RepositoryUrl must be an http(s), ssh, git or file URL, or user@host:path",
            ),
            Self::InvalidBranchName { .. } => formatter.write_str(
                "Branch must be non-empty, contain no whitespace or '..', and not start with '-'",
            ),
            Self::InvalidVectorTableName { .. } => {
                formatter.write_str("VectorTableName must match /^[a-z][a-z0-9_]{0,62}$/")
            },
            Self::DerivedVectorTableNameInvalid { .. } => {
                formatter.write_str("Derived vector table name is invalid (this is a bug).")
            },
            Self::DerivedCheckoutKeyInvalid { .. } => {
                formatter.write_str("Derived checkout key is invalid (this is a bug).")
            },
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let envelope = if error.is_invariant() {
            Self::invariant(error.error_code(), error.to_string())
        } else {
            Self::expected(error.error_code(), error.to_string())
        };

        match error {
            PrimitiveError::InvalidAgentId { input, reason } => envelope
                .with_metadata("input", input)
                .with_metadata("reason", reason),
            PrimitiveError::InvalidAgentName { input_length }
            | PrimitiveError::InvalidAgentVersion { input_length }
            | PrimitiveError::InvalidKnowledgeBaseId { input_length }
            | PrimitiveError::InvalidDataSourceId { input_length }
            | PrimitiveError::InvalidHostedAgentId { input_length } => {
                envelope.with_metadata("input_length", input_length.to_string())
            },
            PrimitiveError::InvalidRepositoryUrl { input }
            | PrimitiveError::InvalidBranchName { input }
            | PrimitiveError::InvalidVectorTableName { input } => {
                envelope.with_metadata("input", input)
            },
            PrimitiveError::DerivedVectorTableNameInvalid { candidate }
            | PrimitiveError::DerivedCheckoutKeyInvalid { candidate } => {
                envelope.with_metadata("candidate", candidate)
            },
        }
    }
}

/// Accessors and serde glue shared by every string-backed primitive.
///
/// Deserialization goes through `parse`, so stored records are revalidated
/// on load.
macro_rules! string_primitive {
    ($name:ident) => {
        impl $name {
            /// Access the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> Box<str> {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = PrimitiveError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.into_inner().into_string()
            }
        }
    };
}

fn trimmed_non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn boxed(value: &str) -> Box<str> {
    value.to_owned().into_boxed_str()
}

/// Identifier of a provisioned agent; also the record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(Box<str>);

impl AgentId {
    /// Parse an `AgentId` from user input.
    ///
    /// Allowed: ASCII alphanumerics plus `_ . -`, starting with an
    /// alphanumeric, no `..`, at most [`MAX_AGENT_ID_LEN`] characters.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let invalid = |reason| PrimitiveError::InvalidAgentId {
            input: raw.trim().to_owned(),
            reason,
        };
        let Some(trimmed) = trimmed_non_empty(raw) else {
            return Err(invalid("must be non-empty"));
        };
        if trimmed.len() > MAX_AGENT_ID_LEN {
            return Err(invalid("is too long"));
        }
        if !trimmed.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(invalid("must start with a letter or digit"));
        }
        if trimmed.contains("..")
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(invalid("may only contain letters, digits, '_', '.', '-'"));
        }
        Ok(Self(boxed(trimmed)))
    }

    /// Mint a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into_boxed_str())
    }
}

string_primitive!(AgentId);

/// Human-readable agent name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(Box<str>);

impl AgentName {
    /// Parse an `AgentName` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        match trimmed_non_empty(raw) {
            Some(trimmed) if trimmed.chars().count() <= MAX_AGENT_NAME_LEN => {
                Ok(Self(boxed(trimmed)))
            },
            _ => Err(PrimitiveError::InvalidAgentName {
                input_length: raw.len(),
            }),
        }
    }

    /// Default name for an agent: `agent-` plus the first 8 id characters.
    #[must_use]
    pub fn default_for(agent_id: &AgentId) -> Self {
        let prefix: String = agent_id.as_str().chars().take(8).collect();
        Self(format!("agent-{prefix}").into_boxed_str())
    }
}

string_primitive!(AgentName);

/// Version label assigned by the agent hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentVersion(Box<str>);

impl AgentVersion {
    /// Parse an `AgentVersion` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        trimmed_non_empty(raw)
            .map(|trimmed| Self(boxed(trimmed)))
            .ok_or(PrimitiveError::InvalidAgentVersion {
                input_length: raw.len(),
            })
    }
}

string_primitive!(AgentVersion);

/// Identifier of a retrieval knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KnowledgeBaseId(Box<str>);

impl KnowledgeBaseId {
    /// Parse a `KnowledgeBaseId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        trimmed_non_empty(raw)
            .map(|trimmed| Self(boxed(trimmed)))
            .ok_or(PrimitiveError::InvalidKnowledgeBaseId {
                input_length: raw.len(),
            })
    }
}

string_primitive!(KnowledgeBaseId);

/// Identifier of a data source attached to a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataSourceId(Box<str>);

impl DataSourceId {
    /// Parse a `DataSourceId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        trimmed_non_empty(raw)
            .map(|trimmed| Self(boxed(trimmed)))
            .ok_or(PrimitiveError::InvalidDataSourceId {
                input_length: raw.len(),
            })
    }
}

string_primitive!(DataSourceId);

/// Identifier the hosting service assigned to a registered agent.
///
/// Distinct from [`AgentId`]: every registration gets its own, so a stale
/// registration can be removed without touching its replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostedAgentId(Box<str>);

impl HostedAgentId {
    /// Parse a `HostedAgentId` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        trimmed_non_empty(raw)
            .map(|trimmed| Self(boxed(trimmed)))
            .ok_or(PrimitiveError::InvalidHostedAgentId {
                input_length: raw.len(),
            })
    }
}

string_primitive!(HostedAgentId);

/// Clone URL of the repository an agent analyses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryUrl(Box<str>);

impl RepositoryUrl {
    /// Parse a clone URL.
    ///
    /// Accepts `http(s)://`, `ssh://`, `git://` and `file://` URLs with a
    /// non-empty remainder, and scp-like `user@host:path` references.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let invalid = || PrimitiveError::InvalidRepositoryUrl {
            input: raw.trim().to_owned(),
        };
        let trimmed = trimmed_non_empty(raw).ok_or_else(invalid)?;
        if trimmed.chars().any(char::is_whitespace) || trimmed.starts_with('-') {
            return Err(invalid());
        }

        let lowered = trimmed.to_ascii_lowercase();
        let scheme_ok = REPOSITORY_SCHEMES.iter().any(|scheme| {
            lowered
                .strip_prefix(scheme)
                .is_some_and(|rest| !rest.trim_matches('/').is_empty())
        });
        if scheme_ok || is_scp_like(trimmed) {
            Ok(Self(boxed(trimmed)))
        } else {
            Err(invalid())
        }
    }
}

string_primitive!(RepositoryUrl);

fn is_scp_like(value: &str) -> bool {
    let Some((user_host, path)) = value.split_once(':') else {
        return false;
    };
    let Some((user, host)) = user_host.split_once('@') else {
        return false;
    };
    !user.is_empty() && !host.is_empty() && !host.contains('/') && !path.is_empty()
}

/// Branch checked out for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(Box<str>);

impl BranchName {
    /// Parse a branch name.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let invalid = || PrimitiveError::InvalidBranchName {
            input: raw.trim().to_owned(),
        };
        let trimmed = trimmed_non_empty(raw).ok_or_else(invalid)?;
        if trimmed.starts_with('-')
            || trimmed.contains("..")
            || trimmed.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(invalid());
        }
        Ok(Self(boxed(trimmed)))
    }
}

string_primitive!(BranchName);

impl Default for BranchName {
    fn default() -> Self {
        Self(boxed(DEFAULT_BRANCH))
    }
}

/// Name of the vector-store table backing a knowledge base.
///
/// Doubles as the record's `vector_store_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VectorTableName(Box<str>);

impl VectorTableName {
    /// Parse a table name that is safe to interpolate into DDL.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let trimmed = raw.trim();
        if is_valid_table_name(trimmed) {
            Ok(Self(boxed(trimmed)))
        } else {
            Err(PrimitiveError::InvalidVectorTableName {
                input: trimmed.to_owned(),
            })
        }
    }
}

string_primitive!(VectorTableName);

fn is_valid_table_name(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= MAX_VECTOR_TABLE_LEN
        && first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Directory component for an agent's checkout; also the object-store key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckoutKey(Box<str>);

impl CheckoutKey {
    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckoutKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Hash naming the resources of one provisioning attempt.
///
/// The per-attempt `generation` nonce keeps two attempts for the same agent,
/// repository, branch and provider apart, so a losing concurrent create or
/// a rebuild never shares a table, checkout or snapshot with another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProvisioningFingerprint(Box<str>);

impl ProvisioningFingerprint {
    /// Compute the fingerprint of a provisioning target.
    #[must_use]
    pub fn compute(
        agent_id: &AgentId,
        repository_url: &RepositoryUrl,
        branch: &BranchName,
        provider: AiProvider,
        generation: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            agent_id.as_str(),
            repository_url.as_str(),
            branch.as_str(),
            provider.as_str(),
            generation,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0_u8]);
        }
        Self(format!("{:x}", hasher.finalize()).into_boxed_str())
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn prefix(&self, len: usize) -> &str {
        self.0.get(..len).unwrap_or(&self.0)
    }
}

/// Derive the vector table name for a provisioning generation.
pub fn derive_vector_table_name(
    fingerprint: &ProvisioningFingerprint,
) -> Result<VectorTableName, PrimitiveError> {
    let candidate = format!("{VECTOR_TABLE_PREFIX}{}", fingerprint.prefix(16));
    VectorTableName::parse(candidate.as_str())
        .map_err(|_| PrimitiveError::DerivedVectorTableNameInvalid { candidate })
}

/// Derive the checkout key (`<agent id>_<table hash>`) from an attempt's vector table.
///
/// Keying the checkout off the table means a stored record alone is enough
/// to find the snapshot it owns.
pub fn derive_checkout_key(
    agent_id: &AgentId,
    table: &VectorTableName,
) -> Result<CheckoutKey, PrimitiveError> {
    let hash = table
        .as_str()
        .strip_prefix(VECTOR_TABLE_PREFIX)
        .unwrap_or(table.as_str());
    let candidate = format!("{}_{hash}", agent_id.as_str());
    let safe = candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        && !candidate.contains("..")
        && candidate.starts_with(|c: char| c.is_ascii_alphanumeric());
    if safe {
        Ok(CheckoutKey(candidate.into_boxed_str()))
    } else {
        Err(PrimitiveError::DerivedCheckoutKeyInvalid { candidate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(
        url: &str,
        branch: &str,
        provider: AiProvider,
        generation: &str,
    ) -> Result<ProvisioningFingerprint, PrimitiveError> {
        Ok(ProvisioningFingerprint::compute(
            &AgentId::parse("agent-1")?,
            &RepositoryUrl::parse(url)?,
            &BranchName::parse(branch)?,
            provider,
            generation,
        ))
    }

    #[test]
    fn agent_id_rules() {
        assert!(AgentId::parse("agent-1").is_ok());
        assert!(AgentId::parse("  a.b_c-9  ").is_ok());
        assert!(AgentId::parse("").is_err());
        assert!(AgentId::parse("-leading").is_err());
        assert!(AgentId::parse("a..b").is_err());
        assert!(AgentId::parse("a/b").is_err());
        assert!(AgentId::parse("x".repeat(MAX_AGENT_ID_LEN + 1)).is_err());
        assert!(AgentId::parse(AgentId::generate().as_str()).is_ok());
    }

    #[test]
    fn default_agent_name_uses_id_prefix() -> Result<(), PrimitiveError> {
        let id = AgentId::parse("0123456789abcdef")?;
        assert_eq!(AgentName::default_for(&id).as_str(), "agent-01234567");
        Ok(())
    }

    #[test]
    fn repository_urls() {
        for ok in [
            "https://github.com/x/y",
            "http://example.com/repo.git",
            "ssh://git@host/repo.git",
            "git@github.com:org/repo.git",
            "file:///tmp/repo",
        ] {
            assert!(RepositoryUrl::parse(ok).is_ok(), "{ok}");
        }
        for bad in ["", "github.com/x/y", "https://", "https://a b", "--upload-pack=x"] {
            assert!(RepositoryUrl::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn branch_names() {
        assert!(BranchName::parse("feature/x").is_ok());
        assert!(BranchName::parse("-f").is_err());
        assert!(BranchName::parse("a..b").is_err());
        assert!(BranchName::parse("a b").is_err());
        assert_eq!(BranchName::default().as_str(), DEFAULT_BRANCH);
    }

    #[test]
    fn derived_names_are_valid_and_distinct_per_generation() -> Result<(), PrimitiveError> {
        let url = "https://github.com/x/y";
        let first = fingerprint(url, "main", AiProvider::Local, "g1")?;
        let other_branch = fingerprint(url, "dev", AiProvider::Local, "g1")?;
        let other_provider = fingerprint(url, "main", AiProvider::Bedrock, "g1")?;
        let other_attempt = fingerprint(url, "main", AiProvider::Local, "g2")?;

        let table = derive_vector_table_name(&first)?;
        assert!(table.as_str().starts_with("agent_kb_"));
        assert_eq!(table.as_str().len(), "agent_kb_".len() + 16);
        assert_ne!(table, derive_vector_table_name(&other_branch)?);
        assert_ne!(table, derive_vector_table_name(&other_provider)?);
        assert_ne!(table, derive_vector_table_name(&other_attempt)?);

        let id = AgentId::parse("agent-1")?;
        let key = derive_checkout_key(&id, &table)?;
        let hash = table.as_str().trim_start_matches("agent_kb_");
        assert_eq!(key.as_str(), format!("agent-1_{hash}"));
        assert_ne!(key, derive_checkout_key(&id, &derive_vector_table_name(&other_attempt)?)?);
        Ok(())
    }

    #[test]
    fn hosted_agent_ids_must_be_non_empty() {
        assert!(HostedAgentId::parse("hosted-1").is_ok());
        let error = HostedAgentId::parse("  ").err();
        assert_eq!(error, Some(PrimitiveError::InvalidHostedAgentId { input_length: 2 }));
    }

    #[test]
    fn primitives_deserialize_through_parse() {
        let parsed: Result<AgentId, _> = serde_json::from_str("\"a/b\"");
        assert!(parsed.is_err());
        let parsed: Result<BranchName, _> = serde_json::from_str("\"main\"");
        assert!(parsed.is_ok());
    }
}
