//! Opaque 128-bit identifiers and the injectable id source.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-ordered 128-bit identifier. Ordering is byte ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    pub fn from_u128(value: u128) -> Self {
        Id(Uuid::from_u128(value))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Id)
    }
}

/// Source of fresh identifiers. Must be monotonic within a process.
pub trait IdSource {
    fn next_id(&mut self) -> Id;
}

/// UUIDv7 ids: millisecond timestamp prefix plus a monotonic counter.
#[derive(Debug, Default)]
pub struct UuidV7Source;

impl IdSource for UuidV7Source {
    fn next_id(&mut self) -> Id {
        Id(Uuid::now_v7())
    }
}

/// Deterministic counter starting at `start`. Two sources with the same start
/// yield the same sequence, which makes whole translations reproducible.
#[derive(Debug, Clone)]
pub struct SequentialIdSource {
    next: u128,
}

impl SequentialIdSource {
    pub fn new(start: u128) -> Self {
        Self { next: start }
    }
}

impl Default for SequentialIdSource {
    fn default() -> Self {
        Self::new(1)
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&mut self) -> Id {
        let id = Id::from_u128(self.next);
        self.next += 1;
        id
    }
}
