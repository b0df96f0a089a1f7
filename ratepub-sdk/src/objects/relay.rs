//! Client/relay message framing (NIP-01).

use super::event::SignedEvent;
use serde_json::Value;

/// Messages sent from the publisher to a relay.
#[derive(Debug, Clone, Copy)]
pub enum ClientMessage<'a> {
    /// `["EVENT", <event>]`
    Event(&'a SignedEvent),
}

impl ClientMessage<'_> {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            ClientMessage::Event(event) => serde_json::to_string(&("EVENT", event)),
        }
    }
}

/// Messages a relay sends back that the publisher cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// `["OK", <event_id>, <accepted>, <message>]`
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    /// `["NOTICE", <message>]`
    Notice(String),
    /// Any other well-formed frame (`EOSE`, `EVENT`, `AUTH`, ...).
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayMessageError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("relay message is not a non-empty array")]
    NotAnArray,
    #[error("malformed {0} message")]
    Malformed(&'static str),
}

impl RelayMessage {
    pub fn parse(text: &str) -> Result<Self, RelayMessageError> {
        let frame: Vec<Value> = serde_json::from_str(text)?;
        let Some(label) = frame.first().and_then(Value::as_str) else {
            return Err(RelayMessageError::NotAnArray);
        };
        match label {
            "OK" => {
                let event_id = frame
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or(RelayMessageError::Malformed("OK"))?;
                let accepted = frame
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or(RelayMessageError::Malformed("OK"))?;
                let message = frame.get(3).and_then(Value::as_str).unwrap_or_default();
                Ok(RelayMessage::Ok {
                    event_id: event_id.to_string(),
                    accepted,
                    message: message.to_string(),
                })
            }
            "NOTICE" => {
                let message = frame
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or(RelayMessageError::Malformed("NOTICE"))?;
                Ok(RelayMessage::Notice(message.to_string()))
            }
            other => Ok(RelayMessage::Other(other.to_string())),
        }
    }
}
