//! Scratch buffers for decrypted packet payloads.
//!
//! Every unpack needs a plaintext buffer that lives exactly as long as
//! the call. [`acquire`] hands out a [`PacketBuffer`] whose backing `Vec`
//! returns to a process-wide free list on drop. Acquisition never blocks:
//! if the free list is contended or empty, a fresh allocation is handed
//! out instead.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

/// Largest UDP payload this layer expects to handle.
const MAX_PACKET_SIZE: usize = 1452;

/// Buffers kept on the free list; anything beyond this is dropped.
#[cfg(feature = "std")]
const POOL_CAPACITY: usize = 32;

#[cfg(feature = "std")]
static POOL: std::sync::Mutex<Vec<Vec<u8>>> = std::sync::Mutex::new(Vec::new());

/// An exclusively borrowed scratch buffer. Dereferences to its `Vec<u8>`;
/// the backing storage is recycled on drop.
pub struct PacketBuffer {
    buf: Vec<u8>,
}

/// Get an empty scratch buffer with at least one packet of capacity.
pub fn acquire() -> PacketBuffer {
    #[cfg(feature = "std")]
    if let Ok(mut pool) = POOL.try_lock() {
        if let Some(buf) = pool.pop() {
            return PacketBuffer { buf };
        }
    }
    PacketBuffer { buf: Vec::with_capacity(MAX_PACKET_SIZE) }
}

impl Deref for PacketBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PacketBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

#[cfg(feature = "std")]
impl Drop for PacketBuffer {
    fn drop(&mut self) {
        // Oversized buffers (a huge frame forced a reallocation) are not
        // worth keeping around.
        if self.buf.capacity() > 2 * MAX_PACKET_SIZE {
            return;
        }
        if let Ok(mut pool) = POOL.try_lock() {
            if pool.len() < POOL_CAPACITY {
                let mut buf = core::mem::take(&mut self.buf);
                buf.clear();
                pool.push(buf);
            }
        }
    }
}
