//! Error taxonomy: decode, validation, transport and queue hand-off failures.
//!
//! Decode and validation errors are always recoverable and become a Reject.
//! Only [`TransportError::Bind`] at startup is fatal.

use crate::messages::reject_code;
use thiserror::Error;

/// Payload could not be turned into an inbound envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),

    #[error("Malformed JSON: Missing header/body")]
    MissingEnvelope,

    /// Recognized-but-not-accepted and unrecognized `type` values alike.
    #[error("Unknown Message Type")]
    UnsupportedMessageType(String),

    #[error("missing required field `{field}` in {kind}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("invalid `{field}` in {kind}: {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl DecodeError {
    /// Offending field, when the failure is attributable to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DecodeError::MissingField { field, .. } | DecodeError::InvalidField { field, .. } => {
                Some(field)
            }
            DecodeError::UnsupportedMessageType(_) => Some("type"),
            DecodeError::InvalidJson(_) | DecodeError::MissingEnvelope => None,
        }
    }

    /// Human-readable reason, as sent in the Reject.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    pub fn code(&self) -> u16 {
        reject_code::MALFORMED
    }
}

/// Decoded request is semantically invalid.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid Quantity")]
    InvalidQuantity(i64),

    #[error("Invalid Price")]
    InvalidPrice(i64),

    #[error("Invalid Symbol")]
    InvalidSymbol,

    #[error("Cancel requires order_id or client_order_id")]
    MissingCancelTarget,
}

impl ValidationError {
    pub fn code(&self) -> u16 {
        match self {
            ValidationError::InvalidQuantity(_) => reject_code::INVALID_QUANTITY,
            ValidationError::InvalidPrice(_) => reject_code::INVALID_PRICE,
            ValidationError::InvalidSymbol => reject_code::INVALID_SYMBOL,
            ValidationError::MissingCancelTarget => reject_code::MISSING_CANCEL_TARGET,
        }
    }
}

/// Listener or session failure. Session errors are local to that session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Rejected queue push. The item is handed back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError<T> {
    /// Capacity reached under [`crate::queue::BackpressurePolicy::Reject`].
    Full(T),
    /// Queue closed; no further items are accepted.
    Closed(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Closed(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_reports_field_and_reason() {
        let e = DecodeError::MissingField {
            kind: "NewOrderRequest",
            field: "symbol",
        };
        assert_eq!(e.field(), Some("symbol"));
        assert!(e.reason().contains("symbol"));
        assert!(e.reason().contains("NewOrderRequest"));
        assert_eq!(e.code(), 400);
        assert_eq!(DecodeError::MissingEnvelope.field(), None);
    }

    #[test]
    fn validation_codes() {
        assert_eq!(ValidationError::InvalidQuantity(0).code(), 101);
        assert_eq!(ValidationError::InvalidQuantity(0).to_string(), "Invalid Quantity");
        assert_eq!(ValidationError::InvalidPrice(-1).code(), 102);
        assert_eq!(ValidationError::MissingCancelTarget.code(), 104);
    }

    #[test]
    fn push_error_returns_item() {
        let e = PushError::Full(5);
        assert!(e.is_full());
        assert_eq!(e.into_inner(), 5);
        assert!(!PushError::Closed(1).is_full());
    }
}
