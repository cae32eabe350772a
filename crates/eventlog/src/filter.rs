use serde::{Deserialize, Serialize};

/// Default number of scanned records between checkpoint heartbeats.
pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 32;

/// What a server-side filter is matched against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterTarget {
    /// The name of the stream a record belongs to.
    StreamName,
    /// The record type.
    RecordType,
}

/// How a filter matches its target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterExpression {
    /// Matches when the target starts with any of the prefixes.
    Prefixes(Vec<String>),
    /// Matches when the target matches the regular expression.
    Regex(String),
}

/// Server-side filter for log-wide reads and subscriptions.
///
/// While scanning, the server reports progress through checkpoint heartbeats
/// every `checkpoint_interval` scanned records, so a consumer of a sparse
/// filter still learns how far the scan has advanced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// What the expression is matched against.
    pub target: FilterTarget,
    /// The match expression.
    pub expression: FilterExpression,
    /// Scanned records between checkpoints.
    pub checkpoint_interval: u32,
    /// Upper bound on records scanned before the server must report back.
    pub max_search_window: Option<u32>,
}

impl RecordFilter {
    /// Filter on stream name prefixes.
    #[must_use]
    pub fn stream_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            FilterTarget::StreamName,
            FilterExpression::Prefixes(prefixes.into_iter().map(Into::into).collect()),
        )
    }

    /// Filter on record type prefixes.
    #[must_use]
    pub fn record_type_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            FilterTarget::RecordType,
            FilterExpression::Prefixes(prefixes.into_iter().map(Into::into).collect()),
        )
    }

    /// Filter on a stream name regular expression.
    #[must_use]
    pub fn stream_regex(pattern: impl Into<String>) -> Self {
        Self::new(
            FilterTarget::StreamName,
            FilterExpression::Regex(pattern.into()),
        )
    }

    /// Filter on a record type regular expression.
    #[must_use]
    pub fn record_type_regex(pattern: impl Into<String>) -> Self {
        Self::new(
            FilterTarget::RecordType,
            FilterExpression::Regex(pattern.into()),
        )
    }

    /// Excludes system record types (those starting with `$`).
    #[must_use]
    pub fn exclude_system_records() -> Self {
        Self::record_type_regex(r"^[^\$].*")
    }

    const fn new(target: FilterTarget, expression: FilterExpression) -> Self {
        Self {
            target,
            expression,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            max_search_window: None,
        }
    }

    /// Sets the checkpoint interval.
    #[must_use]
    pub const fn with_checkpoint_interval(mut self, interval: u32) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Sets the maximum search window.
    #[must_use]
    pub const fn with_max_search_window(mut self, window: u32) -> Self {
        self.max_search_window = Some(window);
        self
    }
}
