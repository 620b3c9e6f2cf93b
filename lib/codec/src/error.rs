use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Client,
    Server,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Client => write!(f, "client"),
            Direction::Server => write!(f, "server"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("frame declares size {declared} shorter than the {header} byte header")]
    ShortFrame { declared: u32, header: usize },

    #[error("unknown {direction} message code 0x{code:02x}")]
    UnknownCode { direction: Direction, code: u32 },

    #[error("frame for code 0x{code:02x} declared {declared} bytes but {consumed} were parsed")]
    TailMismatch {
        code: u32,
        declared: usize,
        consumed: usize,
    },

    #[error("data type code {0} is not implemented (wide/variable-length/structured types are refused)")]
    UnsupportedDataType(u32),

    #[error("unexpected end of buffer while reading a fixed field")]
    UnexpectedEof,
}
