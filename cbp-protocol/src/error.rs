use thiserror::Error;

/// Everything that can go wrong decoding a PDU off the wire.
///
/// `Incomplete` is not a protocol violation: the caller should keep
/// reading bytes and retry the decode. Everything else ends the
/// connection or produces a 5-class reply, per the error handling
/// policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("need more bytes to decode a complete PDU")]
    Incomplete,

    #[error("ASCII field exceeded its maximum length of {max} bytes")]
    LineTooLong { max: usize },

    #[error("expected ASCII bytes, found a non-ASCII byte")]
    NotAscii,

    #[error("unrecognized command (category {category}, command {command})")]
    UnknownCommand { category: u8, command: u8 },

    #[error("unrecognized reply code {0}-{1}-{2}")]
    UnknownReplyCode(u8, u8, u8),
}
