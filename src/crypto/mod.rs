//! Packet protection: AEAD payload encryption, packet-number encryption,
//! and the key derivation that feeds both.
//!
//! The pipeline composes two independent constructions. AES-GCM protects
//! the payload with the packet number XORed into the nonce and the raw
//! header bytes as associated data. A separate AES-CTR cipher masks the
//! packet number octets on the wire, keyed independently and IV'd from a
//! sample of the payload ciphertext. [`protected::ProtectedAead`] bundles
//! the two behind the contract the unpacker consumes.

pub mod aead;
pub mod key_derivation;
pub mod pn_cipher;
pub mod protected;

pub use aead::AeadAesGcm;
pub use key_derivation::{derive_aes_keys, new_null_aead, CipherSuiteParams, TlsExporter};
pub use pn_cipher::PnCipher;
pub use protected::ProtectedAead;

/// Encryption level a packet was protected at.
///
/// Long Headers always carry handshake data ([`Unencrypted`] in the sense
/// that only the connection-ID-derived keys protect it); Short Headers
/// carry 1-RTT data ([`ForwardSecure`]). [`Secure`] is the intermediate
/// gQUIC level reached once the server's diversification nonce is known.
///
/// [`Unencrypted`]: EncryptionLevel::Unencrypted
/// [`Secure`]: EncryptionLevel::Secure
/// [`ForwardSecure`]: EncryptionLevel::ForwardSecure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EncryptionLevel {
    Unencrypted,
    Secure,
    ForwardSecure,
}

impl core::fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EncryptionLevel::Unencrypted => f.write_str("unencrypted"),
            EncryptionLevel::Secure => f.write_str("encrypted (not forward-secure)"),
            EncryptionLevel::ForwardSecure => f.write_str("forward-secure"),
        }
    }
}
