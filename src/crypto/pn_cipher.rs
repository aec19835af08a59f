//! AES-CTR masking of the on-the-wire packet number octets.
//!
//! CTR is a keystream cipher, so encrypt and decrypt are the same XOR;
//! the two names exist for symmetry with the AEAD and to pick the right
//! direction's key.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::{Aes128, Aes256};
use ctr::Ctr128BE;

use crate::error::Error;

/// One AES block; the sample drawn from the packet must be exactly this long.
const IV_SIZE: usize = 16;

#[derive(Clone)]
enum CtrKey {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

impl CtrKey {
    fn new(key: &[u8]) -> Result<Self, Error> {
        match key.len() {
            16 => {
                let mut k = [0u8; 16];
                k.copy_from_slice(key);
                Ok(CtrKey::Aes128(k))
            }
            32 => {
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                Ok(CtrKey::Aes256(k))
            }
            _ => Err(Error::Crypto("invalid AES key size")),
        }
    }

    fn apply(&self, buf: &mut [u8], iv: &[u8]) -> Result<(), Error> {
        if iv.len() != IV_SIZE {
            return Err(Error::WrongIvSize);
        }
        match self {
            CtrKey::Aes128(key) => {
                let mut cipher = Ctr128BE::<Aes128>::new_from_slices(key, iv)
                    .map_err(|_| Error::WrongIvSize)?;
                cipher.apply_keystream(buf);
            }
            CtrKey::Aes256(key) => {
                let mut cipher = Ctr128BE::<Aes256>::new_from_slices(key, iv)
                    .map_err(|_| Error::WrongIvSize)?;
                cipher.apply_keystream(buf);
            }
        }
        Ok(())
    }
}

/// Packet-number cipher for one connection direction pair.
///
/// Our key masks the numbers we send, the peer's key unmasks the numbers
/// we receive. Both keys must be the same length (they come from the same
/// ciphersuite).
pub struct PnCipher {
    my_key: CtrKey,
    other_key: CtrKey,
}

impl PnCipher {
    pub fn new(my_key: &[u8], other_key: &[u8]) -> Result<Self, Error> {
        Ok(PnCipher {
            my_key: CtrKey::new(my_key)?,
            other_key: CtrKey::new(other_key)?,
        })
    }

    /// Mask `buf` in place using our key and the sampled `iv`.
    pub fn encrypt(&self, buf: &mut [u8], iv: &[u8]) -> Result<(), Error> {
        self.my_key.apply(buf, iv)
    }

    /// Unmask `buf` in place using the peer's key and the sampled `iv`.
    pub fn decrypt(&self, buf: &mut [u8], iv: &[u8]) -> Result<(), Error> {
        self.other_key.apply(buf, iv)
    }

    /// Required IV length: one AES block.
    pub fn iv_size(&self) -> usize {
        IV_SIZE
    }
}
