//! AES-GCM payload protection with the packet number folded into the nonce.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce, Tag};
use alloc::vec::Vec;

use crate::error::Error;

/// Length of the GCM authentication tag appended to every sealed payload.
const TAG_LEN: usize = 16;

/// AES-128 or AES-256, selected by key length at construction.
enum GcmCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl GcmCipher {
    fn new(key: &[u8]) -> Result<Self, Error> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(GcmCipher::Aes128)
                .map_err(|_| Error::Crypto("invalid AES key size")),
            32 => Aes256Gcm::new_from_slice(key)
                .map(GcmCipher::Aes256)
                .map_err(|_| Error::Crypto("invalid AES key size")),
            _ => Err(Error::Crypto("invalid AES key size")),
        }
    }

    fn seal_detached(&self, nonce: &[u8; 12], aad: &[u8], buf: &mut [u8]) -> Result<Tag, Error> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            GcmCipher::Aes128(c) => c.encrypt_in_place_detached(nonce, aad, buf),
            GcmCipher::Aes256(c) => c.encrypt_in_place_detached(nonce, aad, buf),
        }
        .map_err(|_| Error::Crypto("AEAD seal failed"))
    }

    fn open_detached(
        &self,
        nonce: &[u8; 12],
        aad: &[u8],
        buf: &mut [u8],
        tag: &[u8],
    ) -> Result<(), Error> {
        let nonce = Nonce::from_slice(nonce);
        let tag = Tag::from_slice(tag);
        match self {
            GcmCipher::Aes128(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
            GcmCipher::Aes256(c) => c.decrypt_in_place_detached(nonce, aad, buf, tag),
        }
        .map_err(|_| Error::DecryptionFailure("message authentication failed"))
    }
}

/// Bidirectional AES-GCM packet protection.
///
/// Holds one cipher per direction. `seal` protects with our key and IV,
/// `open` verifies with the peer's. The nonce is the 12-byte IV with the
/// packet number XORed into its last 8 bytes, so a packet number can never
/// be reused under the same key without also repeating the nonce.
pub struct AeadAesGcm {
    seal_cipher: GcmCipher,
    open_cipher: GcmCipher,
    my_iv: [u8; 12],
    other_iv: [u8; 12],
}

impl AeadAesGcm {
    /// Build from raw key material. Keys select AES-128 (16 bytes) or
    /// AES-256 (32 bytes); IVs must be 12 bytes.
    pub fn new(
        other_key: &[u8],
        my_key: &[u8],
        other_iv: &[u8],
        my_iv: &[u8],
    ) -> Result<Self, Error> {
        if other_iv.len() != 12 || my_iv.len() != 12 {
            return Err(Error::Crypto("AES-GCM: IV must be 12 bytes"));
        }
        let mut my = [0u8; 12];
        my.copy_from_slice(my_iv);
        let mut other = [0u8; 12];
        other.copy_from_slice(other_iv);
        Ok(AeadAesGcm {
            seal_cipher: GcmCipher::new(my_key)?,
            open_cipher: GcmCipher::new(other_key)?,
            my_iv: my,
            other_iv: other,
        })
    }

    /// Bytes of overhead `seal` adds to a payload.
    pub fn overhead(&self) -> usize {
        TAG_LEN
    }

    /// Encrypt `plain` under our key and append ciphertext plus tag to `dst`.
    pub fn seal(
        &self,
        dst: &mut Vec<u8>,
        plain: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<(), Error> {
        let nonce = make_nonce(&self.my_iv, packet_number);
        let start = dst.len();
        dst.extend_from_slice(plain);
        let tag = self
            .seal_cipher
            .seal_detached(&nonce, associated_data, &mut dst[start..])?;
        dst.extend_from_slice(&tag);
        Ok(())
    }

    /// Verify and decrypt `src` (ciphertext plus tag) under the peer's key,
    /// appending the plaintext to `dst`. Returns the plaintext length.
    ///
    /// On any failure `dst` is left exactly as it was.
    pub fn open(
        &self,
        dst: &mut Vec<u8>,
        src: &[u8],
        packet_number: u64,
        associated_data: &[u8],
    ) -> Result<usize, Error> {
        if src.len() < TAG_LEN {
            return Err(Error::DecryptionFailure("ciphertext too short"));
        }
        let nonce = make_nonce(&self.other_iv, packet_number);
        let (ciphertext, tag) = src.split_at(src.len() - TAG_LEN);
        let start = dst.len();
        dst.extend_from_slice(ciphertext);
        match self
            .open_cipher
            .open_detached(&nonce, associated_data, &mut dst[start..], tag)
        {
            Ok(()) => Ok(ciphertext.len()),
            Err(e) => {
                dst.truncate(start);
                Err(e)
            }
        }
    }
}

/// XOR the packet number, big-endian and right-aligned, into the last
/// 8 bytes of the IV.
fn make_nonce(iv: &[u8; 12], packet_number: u64) -> [u8; 12] {
    let mut nonce = *iv;
    let pn = packet_number.to_be_bytes();
    for i in 0..8 {
        nonce[4 + i] ^= pn[i];
    }
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn pair() -> (AeadAesGcm, AeadAesGcm) {
        let key_a = [0x11u8; 16];
        let key_b = [0x22u8; 16];
        let iv_a = [0x33u8; 12];
        let iv_b = [0x44u8; 12];
        let alice = AeadAesGcm::new(&key_b, &key_a, &iv_b, &iv_a).unwrap();
        let bob = AeadAesGcm::new(&key_a, &key_b, &iv_a, &iv_b).unwrap();
        (alice, bob)
    }

    #[test]
    fn seal_open_roundtrip() {
        let (alice, bob) = pair();
        let mut sealed = Vec::new();
        alice.seal(&mut sealed, b"foobar", 0x1337, b"aad").unwrap();
        assert_eq!(sealed.len(), 6 + alice.overhead());

        let mut opened = Vec::new();
        let n = bob.open(&mut opened, &sealed, 0x1337, b"aad").unwrap();
        assert_eq!(&opened[..n], b"foobar");
    }

    #[test]
    fn roundtrip_aes256() {
        let key = [0x42u8; 32];
        let iv = [0x07u8; 12];
        let alice = AeadAesGcm::new(&key, &key, &iv, &iv).unwrap();
        let mut sealed = Vec::new();
        alice.seal(&mut sealed, b"payload", 7, b"hdr").unwrap();
        let mut opened = Vec::new();
        let n = alice.open(&mut opened, &sealed, 7, b"hdr").unwrap();
        assert_eq!(&opened[..n], b"payload");
    }

    #[test]
    fn wrong_packet_number_fails() {
        let (alice, bob) = pair();
        let mut sealed = Vec::new();
        alice.seal(&mut sealed, b"foobar", 42, b"aad").unwrap();
        let mut opened = Vec::new();
        let err = bob.open(&mut opened, &sealed, 43, b"aad").unwrap_err();
        assert!(matches!(err, Error::DecryptionFailure(_)));
        assert!(opened.is_empty());
    }

    #[test]
    fn flipped_bit_fails() {
        let (alice, bob) = pair();
        let mut sealed = Vec::new();
        alice.seal(&mut sealed, b"foobar", 42, b"aad").unwrap();
        sealed[0] ^= 0x01;
        let mut opened = Vec::new();
        assert!(matches!(
            bob.open(&mut opened, &sealed, 42, b"aad"),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn modified_aad_fails() {
        let (alice, bob) = pair();
        let mut sealed = Vec::new();
        alice.seal(&mut sealed, b"foobar", 42, b"aad").unwrap();
        let mut opened = Vec::new();
        assert!(matches!(
            bob.open(&mut opened, &sealed, 42, b"bad"),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let (alice, bob) = pair();
        let mut sealed = Vec::new();
        alice.seal(&mut sealed, b"foobar", 42, b"aad").unwrap();
        let mut opened = Vec::new();
        assert!(matches!(
            bob.open(&mut opened, &sealed[..8], 42, b"aad"),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn rejects_bad_key_and_iv_sizes() {
        assert!(AeadAesGcm::new(&[0; 17], &[0; 17], &[0; 12], &[0; 12]).is_err());
        assert!(AeadAesGcm::new(&[0; 16], &[0; 16], &[0; 11], &[0; 12]).is_err());
    }

    #[test]
    fn nonce_is_iv_for_packet_number_zero() {
        let iv = [0xabu8; 12];
        assert_eq!(make_nonce(&iv, 0), iv);
        let nonce = make_nonce(&iv, 1);
        let mut expected = iv;
        expected[11] ^= 1;
        assert_eq!(nonce, expected);
    }
}
