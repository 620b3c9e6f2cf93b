use std::io;

use codec::CodecError;

/// Errors that can end a session. Most are fatal: the connection is torn
/// down and the session worker thread exits.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("client referenced unmapped sim variable {0:?}")]
    UnmappedVariable(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
