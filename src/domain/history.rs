//! Selection of a historical candle range: a count or a since/until window.

use crate::domain::error::CandlebotError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryRequest {
    pub count: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySelection {
    Count(usize),
    Between {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

impl HistoryRequest {
    pub fn count(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            count: None,
            since: Some(since),
            until: Some(until),
        }
    }

    /// Count and since/until are mutually exclusive; exactly one must be given.
    pub fn selection(&self) -> Result<HistorySelection, CandlebotError> {
        let invalid = |reason: &str| CandlebotError::HistorySelection {
            reason: reason.to_string(),
        };
        match (self.count, self.since, self.until) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(invalid("count cannot be combined with since/until"))
            }
            (Some(0), None, None) => Err(invalid("count must be positive")),
            (Some(n), None, None) => Ok(HistorySelection::Count(n)),
            (None, Some(since), Some(until)) => {
                if since >= until {
                    Err(invalid("since must be before until"))
                } else {
                    Ok(HistorySelection::Between { since, until })
                }
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                Err(invalid("since and until must be given together"))
            }
            (None, None, None) => Err(invalid("either count or since/until is required")),
        }
    }
}
