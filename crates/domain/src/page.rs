//! Listing pages and opaque continuation cursors.
//!
//! Records list newest first: `created_at_ms DESC, agent_id DESC`. A cursor
//! names the last row of the previous page; the next page starts strictly
//! after it. Agent ids compare bytewise, which every backend must match.

use crate::agent::AgentRecord;
use crate::primitives::AgentId;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use code_agent_shared::{ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Validated page size in `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u32);

impl PageSize {
    /// Validate an optional caller-supplied size.
    pub fn parse(requested: Option<u32>) -> Result<Self, PageError> {
        match requested {
            None => Ok(Self(DEFAULT_PAGE_SIZE)),
            Some(value) if (1..=MAX_PAGE_SIZE).contains(&value) => Ok(Self(value)),
            Some(value) => Err(PageError::SizeOutOfRange { value }),
        }
    }

    /// Numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Value as a collection length.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(DEFAULT_PAGE_SIZE)
    }
}

/// Position of the last row returned on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCursor {
    /// Creation time of the last row.
    pub created_at_ms: u64,
    /// Key of the last row.
    pub agent_id: AgentId,
}

impl ListCursor {
    /// Cursor pointing at `record`.
    #[must_use]
    pub fn after(record: &AgentRecord) -> Self {
        Self {
            created_at_ms: record.created_at_ms,
            agent_id: record.agent_id.clone(),
        }
    }

    /// True when `record` sorts strictly after this cursor.
    #[must_use]
    pub fn precedes(&self, record: &AgentRecord) -> bool {
        record.created_at_ms < self.created_at_ms
            || (record.created_at_ms == self.created_at_ms && record.agent_id < self.agent_id)
    }
}

/// Opaque continuation token handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(Box<str>);

impl PageToken {
    /// Encode a cursor.
    pub fn encode(cursor: &ListCursor) -> Result<Self, PageError> {
        let json = serde_json::to_vec(cursor).map_err(|_| PageError::MalformedToken)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json).into_boxed_str()))
    }

    /// Wrap a caller-supplied token without decoding it.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PageError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(PageError::MalformedToken);
        }
        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Decode back into a cursor.
    pub fn decode(&self) -> Result<ListCursor, PageError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.0.as_bytes())
            .map_err(|_| PageError::MalformedToken)?;
        serde_json::from_slice(&bytes).map_err(|_| PageError::MalformedToken)
    }

    /// Token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Listing request understood by record stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListAgentsQuery {
    /// Start strictly after this position.
    pub cursor: Option<ListCursor>,
    /// Maximum number of rows to return.
    pub limit: PageSize,
}

/// One page of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPage {
    /// Records in listing order.
    pub records: Vec<AgentRecord>,
    /// Present when more rows follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<PageToken>,
}

impl AgentPage {
    /// Build a page from rows fetched with `limit + 1`; the surplus row only
    /// signals that another page exists.
    pub fn from_overfetched(
        mut rows: Vec<AgentRecord>,
        limit: PageSize,
    ) -> Result<Self, PageError> {
        let has_more = rows.len() > limit.as_usize();
        rows.truncate(limit.as_usize());
        let next_page_token = match rows.last() {
            Some(last) if has_more => Some(PageToken::encode(&ListCursor::after(last))?),
            _ => None,
        };
        Ok(Self {
            records: rows,
            next_page_token,
        })
    }
}

/// Listing order: newest first, ties broken by descending id.
#[must_use]
pub fn listing_order(left: &AgentRecord, right: &AgentRecord) -> Ordering {
    right
        .created_at_ms
        .cmp(&left.created_at_ms)
        .then_with(|| right.agent_id.cmp(&left.agent_id))
}

/// Page an unordered in-memory collection.
pub fn paginate<'a>(
    records: impl IntoIterator<Item = &'a AgentRecord>,
    query: &ListAgentsQuery,
) -> Result<AgentPage, PageError> {
    let mut rows: Vec<AgentRecord> = records
        .into_iter()
        .filter(|record| {
            query
                .cursor
                .as_ref()
                .is_none_or(|cursor| cursor.precedes(record))
        })
        .cloned()
        .collect();
    rows.sort_by(listing_order);
    rows.truncate(query.limit.as_usize() + 1);
    AgentPage::from_overfetched(rows, query.limit)
}

/// Invalid listing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageError {
    /// Requested size outside `1..=MAX_PAGE_SIZE`.
    SizeOutOfRange {
        /// Requested size.
        value: u32,
    },
    /// Token was not produced by this service.
    MalformedToken,
}

impl fmt::Display for PageError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeOutOfRange { value } => write!(
                formatter,
                "max_results must be between 1 and {MAX_PAGE_SIZE} (got {value})"
            ),
            Self::MalformedToken => formatter.write_str("page token is malformed"),
        }
    }
}

impl std::error::Error for PageError {}

impl From<PageError> for ErrorEnvelope {
    fn from(error: PageError) -> Self {
        let message = error.to_string();
        match error {
            PageError::SizeOutOfRange { value } => {
                Self::expected(ErrorCode::new("domain", "invalid_page_size"), message)
                    .with_metadata("value", value.to_string())
            },
            PageError::MalformedToken => {
                Self::expected(ErrorCode::new("domain", "invalid_page_token"), message)
            },
        }
    }
}
