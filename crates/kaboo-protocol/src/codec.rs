//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The hub serializes a broadcast payload exactly once and then hands the
//! same bytes to every target connection, so the codec is the only place
//! that knows about the wire format.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by the hub
/// loop, every connection handler, and the REST handlers.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Server-to-client frames on the realtime channel are JSON objects, so this
/// is the codec the server is built with.
///
/// ```rust
/// use kaboo_protocol::{Codec, GameId, JsonCodec, ServerEvent, UserId, UserSummary};
///
/// let codec = JsonCodec;
/// let event = ServerEvent::UserJoinedGame {
///     game_id: GameId::new("g1"),
///     user: UserSummary { id: UserId::new("u1"), name: "ann".into() },
/// };
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::SystemMessage;

    #[test]
    fn test_decode_malformed_json_returns_decode_error() {
        let result: Result<SystemMessage, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_type_tag_returns_decode_error() {
        let result: Result<SystemMessage, _> =
            JsonCodec.decode(br#"{"type":"Teleport"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_produces_json_object() {
        let bytes = JsonCodec
            .encode(&SystemMessage::Error {
                code: 401,
                message: "unauthorized".into(),
            })
            .expect("encode");
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).expect("valid json");
        assert!(value.is_object());
        assert_eq!(value["code"], 401);
    }
}
