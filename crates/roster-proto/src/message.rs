//! Server-to-client message shapes.

use serde::{Deserialize, Serialize};

/// Messages the server emits to a connected client.
///
/// Serialized untagged: each variant has a distinct required field, so the
/// JSON object shape alone identifies the variant — `{"id":N}` for the
/// assignment, `{"count":N}` for a count update. Clients never send these;
/// the only client-to-server signal is closing the connection.
///
/// # Invariants
///
/// - A client receives exactly one `IdAssigned`, as the first message on
///   its stream, before any `CountChanged`.
/// - `CountChanged` values arrive in the order the server issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// The session has been admitted and assigned its identifier.
    IdAssigned {
        /// Identifier unique among currently-connected sessions.
        id: u32,
    },

    /// The number of connected sessions changed.
    CountChanged {
        /// Total number of currently-connected sessions.
        count: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_assignment_serializes_to_id_object() {
        let json = serde_json::to_string(&ServerMessage::IdAssigned { id: 7 }).unwrap();
        assert_eq!(json, r#"{"id":7}"#);
    }

    #[test]
    fn count_update_serializes_to_count_object() {
        let json = serde_json::to_string(&ServerMessage::CountChanged { count: 3 }).unwrap();
        assert_eq!(json, r#"{"count":3}"#);
    }

    #[test]
    fn variants_deserialize_by_field_name() {
        let msg: ServerMessage = serde_json::from_str(r#"{"count":42}"#).unwrap();
        assert_eq!(msg, ServerMessage::CountChanged { count: 42 });

        let msg: ServerMessage = serde_json::from_str(r#"{"id":0}"#).unwrap();
        assert_eq!(msg, ServerMessage::IdAssigned { id: 0 });
    }
}
