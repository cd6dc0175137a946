//! Pinned, self-wiping byte buffers for secret material.
//!
//! Pinning is best effort: `mlock` may fail under RLIMIT_MEMLOCK and the
//! buffer is still usable, just swappable. Zeroing is not best effort; it
//! runs in `Drop` on every exit path.

use zeroize::Zeroize;

#[cfg(unix)]
fn lock_region(ptr: *const u8, len: usize) -> bool {
    if len == 0 {
        return false;
    }
    // SAFETY: ptr..ptr+len is a live allocation owned by the caller.
    let rc = unsafe { libc::mlock(ptr as *const libc::c_void, len) };
    if rc != 0 {
        tracing::trace!(len, "mlock failed, continuing unpinned");
    }
    rc == 0
}

#[cfg(unix)]
fn unlock_region(ptr: *const u8, len: usize) {
    // SAFETY: same region that was passed to lock_region.
    unsafe {
        libc::munlock(ptr as *const libc::c_void, len);
    }
}

#[cfg(not(unix))]
fn lock_region(_ptr: *const u8, _len: usize) -> bool {
    false
}

#[cfg(not(unix))]
fn unlock_region(_ptr: *const u8, _len: usize) {}

/// A fixed-length heap buffer that is mlocked while alive and zeroed on drop.
///
/// The backing `Vec` is never grown, so the locked region stays valid.
pub struct SecureBuffer {
    bytes: Vec<u8>,
    locked: bool,
}

impl SecureBuffer {
    /// An all-zero buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![0u8; len])
    }

    /// Take ownership of `bytes` without copying and pin them.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let locked = lock_region(bytes.as_ptr(), bytes.capacity());
        Self { bytes, locked }
    }

    /// Copy `bytes` into a new pinned buffer. The caller still owns (and must
    /// wipe) the source.
    pub fn copy_from(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed(bytes.len());
        buf.bytes.copy_from_slice(bytes);
        buf
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl std::ops::Deref for SecureBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::ops::DerefMut for SecureBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        let ptr = self.bytes.as_ptr();
        let cap = self.bytes.capacity();
        // Vec::zeroize wipes the spare capacity as well.
        self.bytes.zeroize();
        if self.locked {
            unlock_region(ptr, cap);
        }
    }
}

impl std::fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureBuffer")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Pins a borrowed region for as long as the guard lives.
///
/// Used for memory whose wiping is owned elsewhere, e.g. the bytes behind a
/// `SecretString`.
pub struct Pinned<'a> {
    region: &'a [u8],
    locked: bool,
}

impl<'a> Pinned<'a> {
    pub fn new(region: &'a [u8]) -> Self {
        let locked = lock_region(region.as_ptr(), region.len());
        Self { region, locked }
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.region
    }
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        if self.locked {
            unlock_region(self.region.as_ptr(), self.region.len());
        }
    }
}
