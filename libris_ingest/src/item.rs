use std::fmt::Display;

use serde::{Deserialize, Serialize, Serializer};

use crate::{error::TransportAbort, store::StoreError};

/// One creation request read from the input stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestItem<K> {
    pub title: String,
    pub parent_key: K,
    /// Caller-supplied external identifier that must be unique across the
    /// catalog.
    pub natural_key: String,
    pub price_cents: i64,
}

impl<K> IngestItem<K> {
    pub(crate) fn validate(&self) -> Result<(), IngestFailure> {
        if self.title.trim().is_empty() {
            return Err(IngestFailure::new(FailureKind::Invalid, "title is blank"));
        }
        if self.natural_key.trim().is_empty() {
            return Err(IngestFailure::new(FailureKind::Invalid, "natural key is blank"));
        }
        if self.price_cents < 0 {
            return Err(IngestFailure::new(
                FailureKind::Invalid,
                format!("price `{}` is negative", self.price_cents),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    ReferenceNotFound,
    DuplicateKey,
    Invalid,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl IngestFailure {
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn reference_not_found<K: Display>(key: &K) -> Self {
        Self::new(
            FailureKind::ReferenceNotFound,
            format!("referenced entity `{key}` does not exist"),
        )
    }

    pub(crate) fn duplicate_key(natural_key: &str) -> Self {
        Self::new(
            FailureKind::DuplicateKey,
            format!("natural key `{natural_key}` already exists"),
        )
    }
}

impl From<StoreError> for IngestFailure {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Duplicate(_) => FailureKind::DuplicateKey,
            StoreError::MissingReference(_) => FailureKind::ReferenceNotFound,
            StoreError::Other(_) => FailureKind::Storage,
        };
        Self::new(kind, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome<R> {
    Succeeded(R),
    Failed(IngestFailure),
}

impl<R> ItemOutcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn record(&self) -> Option<&R> {
        match self {
            Self::Succeeded(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&IngestFailure> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Result for the `sequence`-th item of a session, counted from zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult<R> {
    pub sequence: u64,
    pub outcome: ItemOutcome<R>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    #[serde(rename = "summarySucceeded")]
    pub succeeded: u64,
    #[serde(rename = "summaryFailed")]
    pub failed: u64,
}

impl IngestSummary {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub(crate) fn record<R>(&mut self, outcome: &ItemOutcome<R>) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// One record on the output stream: a per-item result, the final summary,
/// or the abort marker that follows the summary of an aborted session.
///
/// Serializes to the wire shapes
/// `{"success":true,"createdRecord":..}`,
/// `{"success":false,"errorKind":"DUPLICATE_KEY","message":..}`,
/// `{"summarySucceeded":2,"summaryFailed":1}` and
/// `{"aborted":true,"reason":..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutput<R> {
    Item(ItemResult<R>),
    Summary(IngestSummary),
    Aborted(TransportAbort),
}

impl<R> IngestOutput<R> {
    pub fn is_summary(&self) -> bool {
        matches!(self, Self::Summary(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireOutput<'a, R> {
    #[serde(rename_all = "camelCase")]
    Success { success: bool, created_record: &'a R },
    #[serde(rename_all = "camelCase")]
    Failure {
        success: bool,
        error_kind: FailureKind,
        message: &'a str,
    },
    Summary(&'a IngestSummary),
    Aborted {
        aborted: bool,
        reason: &'a str,
    },
}

impl<R: Serialize> Serialize for IngestOutput<R> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Item(ItemResult {
                outcome: ItemOutcome::Succeeded(record),
                ..
            }) => WireOutput::Success {
                success: true,
                created_record: record,
            },
            Self::Item(ItemResult {
                outcome: ItemOutcome::Failed(failure),
                ..
            }) => WireOutput::Failure {
                success: false,
                error_kind: failure.kind,
                message: &failure.message,
            },
            Self::Summary(summary) => WireOutput::Summary(summary),
            Self::Aborted(abort) => WireOutput::Aborted {
                aborted: true,
                reason: abort.reason(),
            },
        };
        wire.serialize(serializer)
    }
}
