//! Identity of a style document.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a style document.
///
/// Stable for the lifetime of the document it names; the storage layer hands
/// out the same id again after an edit and signals the change separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleId(pub i64);

impl StyleId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StyleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_number() {
        let id = StyleId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: StyleId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }
}
