/// Structured packet-layer errors.
///
/// Errors are values, never panics: every codec and crypto operation
/// returns `Result<T, Error>`. The unpacker never retries on a failed
/// decryption -- the session above decides whether to drop the packet,
/// send a stateless reset, or buffer it until keys arrive.
use core::fmt;

/// Numeric QUIC error codes for the errors this layer can surface.
///
/// These are the gQUIC wire values; they go into CONNECTION_CLOSE frames
/// and public resets built by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    InvalidPacketHeader = 3,
    DecryptionFailure = 12,
    InvalidVersionNegotiationPacket = 37,
    MissingPayload = 48,
}

impl ErrorCode {
    pub const fn to_code(self) -> u32 {
        self as u32
    }
}

/// Packet-layer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed header bytes or a forbidden flag combination.
    InvalidPacketHeader(&'static str),
    /// Long Header type byte outside the defined set.
    InvalidPacketType(u8),
    /// Version Negotiation packet with an empty or misaligned version list.
    InvalidVersionNegotiationPacket(&'static str),
    /// Unknown packet number length encoding.
    InvalidPacketNumberLen,
    /// Long Header connection ID outside {0, 4..=18}.
    InvalidConnectionIdLen(usize),
    /// Long Header source connection ID does not match the configured length.
    WrongSrcConnectionIdLen { len: usize, expected: usize },
    /// Public Header connection ID is not 8 bytes.
    WrongPublicConnectionIdLen(usize),
    /// Public Header with differing source and destination connection IDs.
    MismatchedPublicConnectionIds,
    /// AEAD open failed. The reason is kept for logging only and must
    /// never be echoed onto the wire.
    DecryptionFailure(&'static str),
    /// Successful decryption produced a zero-length payload.
    MissingPayload,
    /// Ran out of bytes while parsing.
    Eof,
    /// The packet-number cipher was handed an IV that is not one AES block.
    WrongIvSize,
    /// The packet is too short to sample a packet-number-encryption IV;
    /// carries the (negative) offset the sampler computed.
    PnSamplingOffset(isize),
    /// Malformed frame in the decrypted payload.
    InvalidFrameData(&'static str),
    /// Key material problem: bad key length, missing keys, derivation failure.
    Crypto(&'static str),
}

impl Error {
    /// The QUIC error code to surface for this error, if it maps to one.
    pub fn wire_code(&self) -> Option<ErrorCode> {
        match self {
            Error::InvalidPacketHeader(_)
            | Error::InvalidPacketType(_)
            | Error::InvalidConnectionIdLen(_)
            | Error::WrongSrcConnectionIdLen { .. }
            | Error::WrongPublicConnectionIdLen(_)
            | Error::MismatchedPublicConnectionIds => Some(ErrorCode::InvalidPacketHeader),
            Error::InvalidVersionNegotiationPacket(_) => {
                Some(ErrorCode::InvalidVersionNegotiationPacket)
            }
            Error::DecryptionFailure(_) | Error::PnSamplingOffset(_) => {
                Some(ErrorCode::DecryptionFailure)
            }
            Error::MissingPayload => Some(ErrorCode::MissingPayload),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPacketHeader(reason) => write!(f, "{reason}"),
            Error::InvalidPacketType(t) => {
                write!(f, "Received packet with invalid packet type: {t}")
            }
            Error::InvalidVersionNegotiationPacket(reason) => {
                write!(f, "invalid version negotiation packet: {reason}")
            }
            Error::InvalidPacketNumberLen => write!(f, "invalid packet number length"),
            Error::InvalidConnectionIdLen(len) => {
                write!(f, "invalid connection ID length: {len} bytes")
            }
            Error::WrongSrcConnectionIdLen { len, expected } => {
                write!(f, "Header: source connection ID must be {expected} bytes, is {len}")
            }
            Error::WrongPublicConnectionIdLen(len) => {
                write!(f, "PublicHeader: wrong length for Connection ID: {len} (expected 8)")
            }
            Error::MismatchedPublicConnectionIds => {
                write!(f, "PublicHeader: SrcConnectionID must be equal to DestConnectionID")
            }
            Error::DecryptionFailure(reason) => write!(f, "decryption failure: {reason}"),
            Error::MissingPayload => write!(f, "missing payload"),
            Error::Eof => write!(f, "EOF"),
            Error::WrongIvSize => write!(f, "wrong IV size"),
            Error::PnSamplingOffset(offset) => write!(
                f,
                "calculated too small packet number encryption sampling offset: {offset}"
            ),
            Error::InvalidFrameData(reason) => write!(f, "invalid frame data: {reason}"),
            Error::Crypto(reason) => write!(f, "{reason}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn wire_codes() {
        assert_eq!(ErrorCode::InvalidPacketHeader.to_code(), 3);
        assert_eq!(ErrorCode::DecryptionFailure.to_code(), 12);
        assert_eq!(ErrorCode::InvalidVersionNegotiationPacket.to_code(), 37);
        assert_eq!(ErrorCode::MissingPayload.to_code(), 48);
    }

    #[test]
    fn error_to_wire_code() {
        assert_eq!(
            Error::MismatchedPublicConnectionIds.wire_code(),
            Some(ErrorCode::InvalidPacketHeader)
        );
        assert_eq!(
            Error::DecryptionFailure("tag mismatch").wire_code(),
            Some(ErrorCode::DecryptionFailure)
        );
        assert_eq!(Error::MissingPayload.wire_code(), Some(ErrorCode::MissingPayload));
        assert_eq!(Error::Eof.wire_code(), None);
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::PnSamplingOffset(-2).to_string(),
            "calculated too small packet number encryption sampling offset: -2"
        );
        assert_eq!(
            Error::InvalidConnectionIdLen(19).to_string(),
            "invalid connection ID length: 19 bytes"
        );
        assert_eq!(
            Error::WrongPublicConnectionIdLen(4).to_string(),
            "PublicHeader: wrong length for Connection ID: 4 (expected 8)"
        );
        assert_eq!(Error::WrongIvSize.to_string(), "wrong IV size");
        assert_eq!(Error::Eof.to_string(), "EOF");
    }
}
