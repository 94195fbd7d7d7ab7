// Licensed under the Apache-2.0 license

/// Wire error codes reported as `[0xFF][code]` when a session aborts.
///
/// Each abort reason has a distinct code so the sending side can present a
/// specific failure to the operator and offer a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Session or per-chunk timeout expired.
    Timeout = 0x01,
    /// Chunk arrived out of order or with a gap.
    Sequence = 0x02,
    /// Per-chunk XOR checksum mismatch.
    Checksum = 0x03,
    /// Staging-area sector erase failed.
    FlashErase = 0x04,
    /// Staging-area page program failed.
    FlashProgram = 0x05,
    /// Image size or chunk length out of bounds.
    Size = 0x06,
    /// Vector-table signature or CRC32 verification failed.
    Integrity = 0x07,
    /// A routine that must not return did; state is undefined.
    Internal = 0x08,
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = ();

    fn try_from(value: u8) -> Result<ErrorCode, ()> {
        match value {
            0x01 => Ok(ErrorCode::Timeout),
            0x02 => Ok(ErrorCode::Sequence),
            0x03 => Ok(ErrorCode::Checksum),
            0x04 => Ok(ErrorCode::FlashErase),
            0x05 => Ok(ErrorCode::FlashProgram),
            0x06 => Ok(ErrorCode::Size),
            0x07 => Ok(ErrorCode::Integrity),
            0x08 => Ok(ErrorCode::Internal),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codes_are_distinct_and_stable() {
        let codes = [
            ErrorCode::Timeout,
            ErrorCode::Sequence,
            ErrorCode::Checksum,
            ErrorCode::FlashErase,
            ErrorCode::FlashProgram,
            ErrorCode::Size,
            ErrorCode::Integrity,
            ErrorCode::Internal,
        ];
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(u8::from(*code), (i + 1) as u8);
            assert_eq!(ErrorCode::try_from((i + 1) as u8), Ok(*code));
        }
        assert!(ErrorCode::try_from(0x00).is_err());
        assert!(ErrorCode::try_from(0x09).is_err());
    }
}
