//! # Id
//!
//! Sortable identifiers for catalog entities.

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use ulid::Ulid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Unexpected};

/// Worker-scoped id generation.
pub mod worker;

/// A sortable 128-bit identifier.
///
/// Ids produced by [`worker::WorkerIdGenerator`] pack a millisecond timestamp,
/// a worker number and a sequence number, so ids from one worker sort by
/// creation order. The text form is the ULID encoding of the same bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u128);

/// Errors that can occur when parsing an [`Id`] from a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("invalid id string")]
    InvalidString,
}

const TIMESTAMP_BITS: u32 = 64;
const WORKER_BITS: u32 = 16;
const SEQUENCE_BITS: u32 = 16;

impl Id {
    #[must_use]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    /// Generates a random sortable id, independent of any worker.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().0)
    }

    /// Packs worker parts into an id.
    ///
    /// # Panics
    ///
    /// Panics if the timestamp does not fit in 64 bits of milliseconds.
    #[must_use]
    pub fn from_worker_parts(time: OffsetDateTime, worker: u16, sequence: u16) -> Self {
        let timestamp_ms = (time.unix_timestamp_nanos() / 1_000_000) as u128;
        assert!(timestamp_ms < (1 << TIMESTAMP_BITS));

        Self(
            (timestamp_ms << (WORKER_BITS + SEQUENCE_BITS))
                | (u128::from(worker) << SEQUENCE_BITS)
                | u128::from(sequence),
        )
    }

    /// Splits the id back into `(time, worker, sequence)`.
    #[must_use]
    pub fn decode_worker(self) -> (OffsetDateTime, u16, u16) {
        let milliseconds = (self.0 >> (WORKER_BITS + SEQUENCE_BITS)) as i64;
        let timestamp = OffsetDateTime::UNIX_EPOCH + Duration::milliseconds(milliseconds);

        let worker = ((self.0 >> SEQUENCE_BITS) & u128::from(u16::MAX)) as u16;
        let sequence = (self.0 & u128::from(u16::MAX)) as u16;

        (timestamp, worker, sequence)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Ulid(self.0).fmt(f)
    }
}

impl FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_str(s)
            .map(|ulid| Self(ulid.0))
            .map_err(|_| ParseIdError::InvalidString)
    }
}

macro_rules! impl_from_unsigned {
    ( $( $source:ty ),* $(,)? ) => {
        $(impl From<$source> for Id {
            fn from(x: $source) -> Self {
                Id::new(x.into())
            }
        })*
    };
}
impl_from_unsigned!(u8, u16, u32, u64);

impl From<Id> for u128 {
    fn from(id: Id) -> Self {
        id.0
    }
}

#[cfg(feature = "serde")]
impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let value = String::deserialize(deserializer)?;
        value
            .parse::<Self>()
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(value.as_str()), &"Id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display() {
        let id = Id::generate();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!("not an id".parse::<Id>(), Err(ParseIdError::InvalidString));
    }

    #[test]
    fn worker_parts() {
        let ts = OffsetDateTime::from_unix_timestamp(42).unwrap() + Duration::milliseconds(1337);

        let id = Id::from_worker_parts(ts, 3, 7);
        let (timestamp, worker, sequence) = id.decode_worker();
        assert_eq!(timestamp, ts);
        assert_eq!(worker, 3);
        assert_eq!(sequence, 7);

        let later = Id::from_worker_parts(ts + Duration::milliseconds(1), 0, 0);
        assert!(later > id);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize() {
        let id = Id::new(42);
        let js = serde_json::to_string(&id).unwrap();
        assert_eq!(js, format!("\"{id}\""));
        assert_eq!(serde_json::from_str::<Id>(&js).unwrap(), id);
    }
}
