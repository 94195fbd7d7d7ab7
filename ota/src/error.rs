// Licensed under the Apache-2.0 license

use crate::hil::FlashError;
use ota_protocol::ErrorCode;

/// Session failure reasons. Every variant except
/// `InternalInvariantViolation` is session-recoverable: the main image is
/// untouched and a reset restores the previously-working firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// Session or per-chunk timeout expired.
    ProtocolTimeout,
    /// Chunk sequence number did not match the expected next value.
    Sequence,
    /// Chunk payload failed its XOR checksum.
    Checksum,
    /// Erase of a staging sector failed.
    FlashErase,
    /// Program of a staging page failed.
    FlashProgram,
    /// Chunk length, image size or sector count out of bounds.
    Size,
    /// Vector-table signature or CRC32 verification failed.
    Integrity,
    /// A routine that must never return did return.
    InternalInvariantViolation,
}

impl UpdateError {
    /// The code reported on the wire as `[0xFF][code]`.
    pub fn wire_code(self) -> ErrorCode {
        match self {
            UpdateError::ProtocolTimeout => ErrorCode::Timeout,
            UpdateError::Sequence => ErrorCode::Sequence,
            UpdateError::Checksum => ErrorCode::Checksum,
            UpdateError::FlashErase => ErrorCode::FlashErase,
            UpdateError::FlashProgram => ErrorCode::FlashProgram,
            UpdateError::Size => ErrorCode::Size,
            UpdateError::Integrity => ErrorCode::Integrity,
            UpdateError::InternalInvariantViolation => ErrorCode::Internal,
        }
    }

    /// Whether abandoning the session and resetting restores a working
    /// system.
    pub fn session_recoverable(self) -> bool {
        !matches!(self, UpdateError::InternalInvariantViolation)
    }
}

impl From<FlashError> for UpdateError {
    fn from(err: FlashError) -> UpdateError {
        match err {
            FlashError::Erase => UpdateError::FlashErase,
            FlashError::Program => UpdateError::FlashProgram,
            FlashError::OutOfBounds => UpdateError::Size,
        }
    }
}
