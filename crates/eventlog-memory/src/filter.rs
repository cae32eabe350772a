use proven_eventlog::{FilterExpression, FilterTarget, RecordFilter};
use regex::Regex;

use crate::state::StoredRecord;

#[derive(Debug)]
enum Matcher {
    Prefixes(Vec<String>),
    Regex(Regex),
}

/// A [`RecordFilter`] ready to match stored records.
#[derive(Debug)]
pub(crate) struct CompiledFilter {
    target: FilterTarget,
    matcher: Matcher,
    checkpoint_interval: usize,
}

impl CompiledFilter {
    pub(crate) fn compile(filter: &RecordFilter) -> Result<Self, regex::Error> {
        let matcher = match &filter.expression {
            FilterExpression::Prefixes(prefixes) => Matcher::Prefixes(prefixes.clone()),
            FilterExpression::Regex(pattern) => Matcher::Regex(Regex::new(pattern)?),
        };

        Ok(Self {
            target: filter.target,
            matcher,
            checkpoint_interval: usize::try_from(filter.checkpoint_interval)
                .unwrap_or(usize::MAX)
                .max(1),
        })
    }

    pub(crate) fn matches(&self, record: &StoredRecord) -> bool {
        let subject = match self.target {
            FilterTarget::StreamName => record.stream.as_str(),
            FilterTarget::RecordType => record.schema.name.as_str(),
        };

        match &self.matcher {
            Matcher::Prefixes(prefixes) => prefixes
                .iter()
                .any(|prefix| subject.starts_with(prefix.as_str())),
            Matcher::Regex(regex) => regex.is_match(subject),
        }
    }

    /// Whether a checkpoint is due after `scanned` records.
    pub(crate) const fn checkpoint_due(&self, scanned: usize) -> bool {
        scanned % self.checkpoint_interval == 0
    }
}
