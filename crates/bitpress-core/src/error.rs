use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Error taxonomy shared by every bitpress crate.
///
/// `Invalid` is raised synchronously at the call that introduced the bad
/// value. `Corrupt` is raised only after all computation is complete, on a
/// decrypt path whose authentication tag did not match; no plaintext is
/// released alongside it. `Bug` marks a caller or internal invariant
/// violation and is not meant to be handled gracefully.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid parameter: {0}")]
    Invalid(&'static str),

    #[error("corrupt data: {0}")]
    Corrupt(&'static str),

    #[error("bug: {0}")]
    Bug(&'static str),
}
