//! Identifier types for tracked vehicles and subscription sessions

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Identifier assigned to updates that carry neither `truckId` nor `id`.
pub const UNKNOWN_ENTITY: &str = "Unknown-Truck";

/// Opaque identifier for a tracked vehicle.
///
/// Two updates with the same EntityId refer to the same logical vehicle.
/// Ordering is lexicographic so fleet iteration is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel used when an update cannot be attributed.
    pub fn unknown() -> Self {
        Self(UNKNOWN_ENTITY.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_ENTITY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier for one connect-subscribe-disconnect session
///
/// Uses UUID v7 so sessions sort by the time they were opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new SessionId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_equality() {
        assert_eq!(EntityId::new("TRUCK-0001"), EntityId::from("TRUCK-0001"));
        assert_ne!(EntityId::new("TRUCK-0001"), EntityId::new("TRUCK-0002"));
    }

    #[test]
    fn test_unknown_entity() {
        let id = EntityId::unknown();
        assert_eq!(id.as_str(), "Unknown-Truck");
        assert!(id.is_unknown());
        assert!(!EntityId::new("T1").is_unknown());
    }

    #[test]
    fn test_entity_id_ordering_is_lexicographic() {
        let mut ids = vec![EntityId::new("B"), EntityId::new("A"), EntityId::new("C")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_entity_id_serialization() {
        let id = EntityId::new("TRUCK-0042");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"TRUCK-0042\"");

        let deserialized: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_session_id_creation() {
        let s1 = SessionId::new();
        let s2 = SessionId::new();
        assert_ne!(s1, s2, "SessionIds should be unique");
        assert_eq!(s1.as_uuid().get_version_num(), 7);
    }
}
