//! Frame-level codec for the game's websocket dialect.
//!
//! Every application message is a text frame carrying a JSON array whose
//! first element is the opcode as a *numeric string* and whose remaining
//! elements are positional arguments:
//!
//! ```text
//! ["20", 0, "hello"]        chat broadcast from player 0
//! ["16", "room_full"]       admission rejection
//! ```
//!
//! The opcode stays a string on the wire — existing clients reject raw
//! numbers.

use serde_json::Value;

use crate::ProtocolError;

/// A decoded frame: opcode plus positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: String,
    pub args: Vec<Value>,
}

/// Decodes a text frame into opcode + args.
///
/// # Errors
/// Returns a [`ProtocolError`] when the text is not JSON, not an array,
/// or the first element is not a string.
pub fn decode(text: &str) -> Result<Frame, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(mut elements) = value else {
        return Err(ProtocolError::NotAnArray);
    };
    if elements.is_empty() {
        return Err(ProtocolError::MissingOpcode);
    }
    let opcode = match elements.remove(0) {
        Value::String(op) => op,
        _ => return Err(ProtocolError::MissingOpcode),
    };
    Ok(Frame {
        opcode,
        args: elements,
    })
}

/// Encodes an opcode and arguments into frame text.
pub fn encode(opcode: &str, args: Vec<Value>) -> String {
    let mut elements = Vec::with_capacity(args.len() + 1);
    elements.push(Value::String(opcode.to_string()));
    elements.extend(args);
    // Display on Value is infallible; map keys are always strings here.
    Value::Array(elements).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_chat_frame() {
        let frame = decode(r#"["10",{"message":"hi"}]"#).unwrap();
        assert_eq!(frame.opcode, "10");
        assert_eq!(frame.args, vec![json!({"message": "hi"})]);
    }

    #[test]
    fn test_decode_rejects_non_array() {
        assert!(matches!(
            decode(r#"{"op":"10"}"#),
            Err(ProtocolError::NotAnArray)
        ));
    }

    #[test]
    fn test_decode_rejects_numeric_opcode() {
        // Opcodes travel as strings; a raw number is a protocol violation.
        assert!(matches!(
            decode(r#"[10,{"message":"hi"}]"#),
            Err(ProtocolError::MissingOpcode)
        ));
    }

    #[test]
    fn test_decode_rejects_empty_array() {
        assert!(matches!(decode("[]"), Err(ProtocolError::MissingOpcode)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_encode_produces_exact_text() {
        let text = encode("5", vec![json!(3), json!(120)]);
        assert_eq!(text, r#"["5",3,120]"#);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let args = vec![json!(0), json!("invalid"), json!("alice"), json!(false)];
        let frame = decode(&encode("4", args.clone())).unwrap();
        assert_eq!(frame.opcode, "4");
        assert_eq!(frame.args, args);
    }
}
