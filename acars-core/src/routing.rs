//! Per-label storage policy.
//!
//! Some labels are noise (link tests, squitters) and are never stored. Some
//! are worth keeping only once per flight and day. Everything else is stored
//! every time it is received. This module makes that decision; executing it
//! against a store is the caller's job.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::AcarsMessage;

/// What to do with a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Discard; never persisted.
    Skip,
    /// Persist only if no row exists for the same [`OnceKey`].
    InsertOnce,
    /// Always persist.
    Insert,
}

/// Label sets driving [`Route`] selection.
#[derive(Debug, Clone, Default)]
pub struct LabelPolicy {
    skip: HashSet<String>,
    once: HashSet<String>,
}

impl LabelPolicy {
    pub fn new<S, O>(skip: S, once: O) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        LabelPolicy {
            skip: skip.into_iter().map(Into::into).collect(),
            once: once.into_iter().map(Into::into).collect(),
        }
    }

    /// Route for a label. The skip set wins when a label is in both sets.
    pub fn route(&self, label: &str) -> Route {
        if self.skip.contains(label) {
            Route::Skip
        } else if self.once.contains(label) {
            Route::InsertOnce
        } else {
            Route::Insert
        }
    }
}

/// Storage-level uniqueness key for the insert-once path.
///
/// Narrower than [`crate::identity::same`]: one stored row per flight,
/// registration and UTC day, whatever the label, mode or channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OnceKey {
    pub date: NaiveDate,
    pub flight_id: String,
    pub registration: String,
}

impl OnceKey {
    pub fn of(message: &AcarsMessage) -> Self {
        OnceKey {
            date: message.timestamp.date_naive(),
            flight_id: message.flight_id.clone(),
            registration: message.registration.clone(),
        }
    }
}

/// Terminal result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Skip label, or an insert-once that found an existing row.
    Skipped,
    InsertedOnce,
    Inserted,
    /// Rejected by a uniqueness constraint in the store.
    Duplicate,
    /// Any other store failure; the message is dropped.
    PersistenceError(String),
    /// No store configured; the message was only logged.
    NotStored,
}

impl Outcome {
    /// Short tag used in per-message log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Outcome::Skipped => "SKIP",
            Outcome::InsertedOnce => "ONCE",
            Outcome::Inserted => "INSERT",
            Outcome::Duplicate => "DUP",
            Outcome::PersistenceError(_) => "ERROR",
            Outcome::NotStored => "LOG",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::InsertedOnce => write!(f, "inserted-once"),
            Outcome::Inserted => write!(f, "inserted"),
            Outcome::Duplicate => write!(f, "duplicate"),
            Outcome::PersistenceError(e) => write!(f, "persistence-error: {e}"),
            Outcome::NotStored => write!(f, "not-stored"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn policy() -> LabelPolicy {
        LabelPolicy::new(["Q0", "_d"], ["H1", "5Z"])
    }

    #[test]
    fn test_route_skip() {
        assert_eq!(policy().route("Q0"), Route::Skip);
        assert_eq!(policy().route("_d"), Route::Skip);
    }

    #[test]
    fn test_route_once() {
        assert_eq!(policy().route("H1"), Route::InsertOnce);
    }

    #[test]
    fn test_route_default_insert() {
        assert_eq!(policy().route("SA"), Route::Insert);
        assert_eq!(LabelPolicy::default().route("Q0"), Route::Insert);
    }

    #[test]
    fn test_skip_wins_over_once() {
        let p = LabelPolicy::new(["H1"], ["H1"]);
        assert_eq!(p.route("H1"), Route::Skip);
    }

    #[test]
    fn test_route_is_case_sensitive() {
        assert_eq!(policy().route("q0"), Route::Insert);
    }

    #[test]
    fn test_once_key_uses_utc_date() {
        let msg = AcarsMessage {
            timestamp: Utc.with_ymd_and_hms(2016, 7, 28, 23, 59, 59).unwrap(),
            channel: 1,
            error_count: 0,
            signal_level: 10,
            mode: '2',
            registration: "F-GKXA".into(),
            ack: '!',
            label: "H1".into(),
            block_id: '1',
            msg_id: "M01A".into(),
            flight_id: "AF0123".into(),
            text: String::new(),
            frequency: None,
        };
        let key = OnceKey::of(&msg);
        assert_eq!(key.date, NaiveDate::from_ymd_opt(2016, 7, 28).unwrap());
        assert_eq!(key.flight_id, "AF0123");
        assert_eq!(key.registration, "F-GKXA");
    }

    #[test]
    fn test_outcome_tags() {
        assert_eq!(Outcome::Skipped.tag(), "SKIP");
        assert_eq!(Outcome::InsertedOnce.tag(), "ONCE");
        assert_eq!(Outcome::Duplicate.tag(), "DUP");
        assert_eq!(
            Outcome::PersistenceError("disk full".into()).to_string(),
            "persistence-error: disk full"
        );
    }
}
