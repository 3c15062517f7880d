//! Inbound event definitions for the Fleet Sync service
//!
//! `InboundEvent` is what a transport pushes into the processing queue;
//! `RawUpdate` is a decoded position report before entity resolution.

use fleet_types::position::Position;
use serde::{Deserialize, Serialize};

/// A decoded position report.
///
/// Producers may identify the vehicle with either `truckId` or `id`; the
/// resolver decides which one wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl RawUpdate {
    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }
}

/// Events delivered by a transport on the subscription queue, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Verbatim payload of one message on the subscribed topic.
    Message(Vec<u8>),
    /// The underlying connection is gone; no further messages follow.
    ConnectionLost(String),
}

impl InboundEvent {
    /// Get the event type as a string label for logging.
    pub fn event_type_label(&self) -> &'static str {
        match self {
            InboundEvent::Message(_) => "Message",
            InboundEvent::ConnectionLost(_) => "ConnectionLost",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_update_wire_names() {
        let update = RawUpdate {
            truck_id: Some("TRUCK-0001".to_string()),
            id: None,
            latitude: -33.9249,
            longitude: 18.4241,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["truckId"], "TRUCK-0001");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_raw_update_position() {
        let update = RawUpdate {
            truck_id: None,
            id: None,
            latitude: 1.5,
            longitude: 2.5,
        };
        assert_eq!(update.position(), Position::new(1.5, 2.5));
    }

    #[test]
    fn test_event_type_label() {
        assert_eq!(InboundEvent::Message(vec![]).event_type_label(), "Message");
        assert_eq!(
            InboundEvent::ConnectionLost("eof".into()).event_type_label(),
            "ConnectionLost"
        );
    }
}
