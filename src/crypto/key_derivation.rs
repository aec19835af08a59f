//! Key derivation: the "QUIC " HKDF label scheme, connection-ID-derived
//! handshake secrets, and 1-RTT keys pulled from the TLS exporter.

use alloc::vec;
use alloc::vec::Vec;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::aead::AeadAesGcm;
use crate::crypto::pn_cipher::PnCipher;
use crate::crypto::protected::ProtectedAead;
use crate::error::Error;
use crate::packet::Perspective;

const CLIENT_EXPORTER_LABEL: &str = "EXPORTER-QUIC client 1rtt";
const SERVER_EXPORTER_LABEL: &str = "EXPORTER-QUIC server 1rtt";

/// Salt for the connection-ID-derived handshake secrets. Fixed by the
/// QUIC version.
pub const QUIC_VERSION_1_SALT: [u8; 20] = [
    0x9c, 0x10, 0x8f, 0x98, 0x52, 0x0a, 0x5c, 0x5c, 0x32, 0x96, 0x8e, 0x95, 0x0e, 0x8a, 0x2c,
    0x5f, 0xe0, 0x6d, 0x6c, 0x38,
];

/// The parameters of the negotiated TLS ciphersuite this layer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    /// Output length of the suite's hash (32 for SHA-256, 48 for SHA-384).
    pub hash_len: usize,
    /// AEAD key length (16 for AES-128-GCM, 32 for AES-256-GCM).
    pub key_len: usize,
    /// AEAD IV length (12 for both GCM suites).
    pub iv_len: usize,
}

/// The slice of the TLS stack this layer consumes: the negotiated
/// ciphersuite and the exporter interface.
pub trait TlsExporter {
    fn cipher_suite(&self) -> CipherSuiteParams;
    fn compute_exporter(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>, Error>;
}

/// HKDF-Expand with the "QUIC " label scheme.
///
/// The info field is: 2-byte big-endian output length, 1-byte length of
/// `"QUIC " + label`, then that string.
pub fn qhkdf_expand(secret: &[u8], label: &str, length: usize) -> Result<Vec<u8>, Error> {
    let hk = Hkdf::<Sha256>::from_prk(secret)
        .map_err(|_| Error::Crypto("qhkdf: secret shorter than one hash output"))?;
    let mut okm = vec![0u8; length];
    hk.expand(&qhkdf_info(label, length), &mut okm)
        .map_err(|_| Error::Crypto("qhkdf: invalid output length"))?;
    Ok(okm)
}

fn qhkdf_info(label: &str, length: usize) -> Vec<u8> {
    let mut info = Vec::with_capacity(2 + 1 + 5 + label.len());
    info.extend_from_slice(&(length as u16).to_be_bytes());
    info.push((5 + label.len()) as u8);
    info.extend_from_slice(b"QUIC ");
    info.extend_from_slice(label.as_bytes());
    info
}

/// Derive the client and server handshake secrets from the connection ID.
pub fn compute_secrets(connection_id: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let (handshake_secret, _) =
        Hkdf::<Sha256>::extract(Some(&QUIC_VERSION_1_SALT[..]), connection_id);
    let client = qhkdf_expand(&handshake_secret, "client hs", 32)?;
    let server = qhkdf_expand(&handshake_secret, "server hs", 32)?;
    Ok((client, server))
}

/// The AES-128 key, IV and packet-number key for one direction of the
/// handshake epoch.
fn compute_null_aead_key_and_iv(secret: &[u8]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), Error> {
    let key = qhkdf_expand(secret, "key", 16)?;
    let iv = qhkdf_expand(secret, "iv", 12)?;
    let pn_key = qhkdf_expand(secret, "pn", 16)?;
    Ok((key, iv, pn_key))
}

/// Build the handshake-epoch AEAD for `perspective` from the connection ID.
///
/// Both peers derive the same two secrets; the perspective decides which
/// one seals and which one opens.
pub fn new_null_aead(connection_id: &[u8], perspective: Perspective) -> Result<ProtectedAead, Error> {
    let (client_secret, server_secret) = compute_secrets(connection_id)?;
    let (my_secret, other_secret) = match perspective {
        Perspective::Client => (client_secret, server_secret),
        Perspective::Server => (server_secret, client_secret),
    };

    let (my_key, my_iv, my_pn_key) = compute_null_aead_key_and_iv(&my_secret)?;
    let (other_key, other_iv, other_pn_key) = compute_null_aead_key_and_iv(&other_secret)?;

    Ok(ProtectedAead::new(
        AeadAesGcm::new(&other_key, &my_key, &other_iv, &my_iv)?,
        PnCipher::new(&my_pn_key, &other_pn_key)?,
    ))
}

/// Derive the 1-RTT AEAD from a completed TLS handshake.
pub fn derive_aes_keys<T: TlsExporter + ?Sized>(
    tls: &T,
    perspective: Perspective,
) -> Result<ProtectedAead, Error> {
    let (my_label, other_label) = match perspective {
        Perspective::Client => (CLIENT_EXPORTER_LABEL, SERVER_EXPORTER_LABEL),
        Perspective::Server => (SERVER_EXPORTER_LABEL, CLIENT_EXPORTER_LABEL),
    };
    let (my_key, my_iv, my_pn_key) = compute_key_and_iv(tls, my_label)?;
    let (other_key, other_iv, other_pn_key) = compute_key_and_iv(tls, other_label)?;

    Ok(ProtectedAead::new(
        AeadAesGcm::new(&other_key, &my_key, &other_iv, &my_iv)?,
        PnCipher::new(&my_pn_key, &other_pn_key)?,
    ))
}

fn compute_key_and_iv<T: TlsExporter + ?Sized>(
    tls: &T,
    label: &str,
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), Error> {
    let cs = tls.cipher_suite();
    let secret = tls.compute_exporter(label, &[], cs.hash_len)?;
    let key = qhkdf_expand(&secret, "key", cs.key_len)?;
    let iv = qhkdf_expand(&secret, "iv", cs.iv_len)?;
    let pn_key = qhkdf_expand(&secret, "pn", cs.key_len)?;
    Ok((key, iv, pn_key))
}
