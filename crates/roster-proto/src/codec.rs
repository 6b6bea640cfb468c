//! Newline-delimited JSON line codec.
//!
//! One message per line, UTF-8 JSON terminated by `\n`. Lines are tiny
//! (two small objects exist), so [`MAX_LINE_LEN`] is generous; anything
//! longer is rejected before parsing.

use bytes::BufMut;

use crate::{
    errors::{ProtocolError, Result},
    message::ServerMessage,
};

/// Maximum accepted length of one encoded line, including the newline.
pub const MAX_LINE_LEN: usize = 1024;

/// Encode a message as one JSON line into `dst`.
///
/// Writes the JSON object followed by a single `\n`.
pub fn encode_line(message: &ServerMessage, dst: &mut impl BufMut) -> Result<()> {
    let json =
        serde_json::to_vec(message).map_err(|e| ProtocolError::Encode(e.to_string()))?;

    debug_assert!(json.len() < MAX_LINE_LEN);

    dst.put_slice(&json);
    dst.put_u8(b'\n');
    Ok(())
}

/// Decode a single line, with or without its trailing newline.
pub fn decode_line(line: &[u8]) -> Result<ServerMessage> {
    if line.len() > MAX_LINE_LEN {
        return Err(ProtocolError::LineTooLong { size: line.len(), max: MAX_LINE_LEN });
    }

    let body = match line.split_last() {
        Some((b'\n', rest)) => rest,
        _ => line,
    };

    serde_json::from_slice(body).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn encodes_count_update_as_terminated_line() {
        let mut buf = BytesMut::new();
        encode_line(&ServerMessage::CountChanged { count: 3 }, &mut buf).unwrap();
        assert_eq!(&buf[..], b"{\"count\":3}\n");
    }

    #[test]
    fn encodes_id_assignment_as_terminated_line() {
        let mut buf = BytesMut::new();
        encode_line(&ServerMessage::IdAssigned { id: 0 }, &mut buf).unwrap();
        assert_eq!(&buf[..], b"{\"id\":0}\n");
    }

    #[test]
    fn decodes_with_and_without_newline() {
        let msg = decode_line(b"{\"count\":12}\n").unwrap();
        assert_eq!(msg, ServerMessage::CountChanged { count: 12 });

        let msg = decode_line(b"{\"count\":12}").unwrap();
        assert_eq!(msg, ServerMessage::CountChanged { count: 12 });
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(decode_line(b"not json\n"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode_line(b"{}"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(decode_line(b"{\"rooms\":1}"), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn rejects_oversized_line() {
        let line = vec![b' '; MAX_LINE_LEN + 1];
        assert!(matches!(
            decode_line(&line),
            Err(ProtocolError::LineTooLong { size, max: MAX_LINE_LEN }) if size == MAX_LINE_LEN + 1
        ));
    }
}
