//! Cache-line-aligned byte buffers for bucket storage.
//!
//! Every filter in this crate keeps its buckets in an [`AlignedBuf`]: a
//! zero-initialized allocation aligned to 64 bytes so that cache-line-sized
//! bucket reads never straddle a line and the SWAR probes may issue
//! unaligned 64-bit loads within the buffer. On Linux, large buffers whose
//! rounding waste stays under 5% are backed by 2 MiB huge pages, with a
//! transparent fallback to the plain aligned path when huge pages are
//! unavailable.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

const ALIGNMENT: usize = 64;

#[cfg(target_os = "linux")]
const HUGE_PAGE_SIZE: usize = 1 << 21;

// Wiggle room on allocating more memory than specifically requested.
#[cfg(target_os = "linux")]
const OVERAGE_LIMIT: f64 = 0.05;

/// An owned, zero-initialized, 64-byte-aligned byte buffer of fixed length.
///
/// # Examples
///
/// ```
/// use amq_filters::aligned::AlignedBuf;
///
/// let buf = AlignedBuf::new(4096);
/// assert_eq!(buf.len(), 4096);
/// assert_eq!(buf.as_ptr() as usize % 64, 0);
/// assert!(buf.iter().all(|&byte| byte == 0));
/// ```
pub struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    huge: bool,
}

// The buffer is exclusively owned heap memory; sharing a reference across
// threads only permits reads.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Allocates a zeroed buffer of `len` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` is 0 or if the allocator fails.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "cannot allocate an empty buffer");
        #[cfg(target_os = "linux")]
        {
            let waste = (HUGE_PAGE_SIZE - len % HUGE_PAGE_SIZE) % HUGE_PAGE_SIZE;
            if (waste as f64) < OVERAGE_LIMIT * len as f64 {
                if let Some(ptr) = huge_page_alloc(len) {
                    return AlignedBuf {
                        ptr,
                        len,
                        huge: true,
                    };
                }
            }
        }
        let ptr = unsafe { alloc_zeroed(Self::layout(len)) };
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => std::alloc::handle_alloc_error(Self::layout(len)),
        };
        AlignedBuf {
            ptr,
            len,
            huge: false,
        }
    }

    /// Allocates a buffer holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::new(bytes.len());
        buf.copy_from_slice(bytes);
        buf
    }

    /// Returns the buffer length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer has length 0. Always `false`; buffers
    /// cannot be constructed empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resets every byte to 0.
    pub fn zero(&mut self) {
        self.fill(0);
    }

    fn layout(len: usize) -> Layout {
        match Layout::from_size_align(len, ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => panic!("buffer of {} bytes overflows the address space", len),
        }
    }
}

#[cfg(target_os = "linux")]
fn round_to_huge_pages(len: usize) -> usize {
    (len + HUGE_PAGE_SIZE - 1) / HUGE_PAGE_SIZE * HUGE_PAGE_SIZE
}

#[cfg(target_os = "linux")]
fn huge_page_alloc(len: usize) -> Option<NonNull<u8>> {
    let bytes = round_to_huge_pages(len);
    // MAP_ANONYMOUS memory is zero-filled on Linux.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return None;
    }
    NonNull::new(ptr as *mut u8)
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        #[cfg(target_os = "linux")]
        if self.huge {
            unsafe {
                libc::munmap(
                    self.ptr.as_ptr() as *mut libc::c_void,
                    round_to_huge_pages(self.len),
                );
            }
            return;
        }
        unsafe { dealloc(self.ptr.as_ptr(), Self::layout(self.len)) };
    }
}

impl Deref for AlignedBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Clone for AlignedBuf {
    fn clone(&self) -> Self {
        Self::from_slice(self)
    }
}

impl PartialEq for AlignedBuf {
    fn eq(&self, other: &AlignedBuf) -> bool {
        self[..] == other[..]
    }
}

impl Eq for AlignedBuf {}

impl fmt::Debug for AlignedBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("huge", &self.huge)
            .finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AlignedBuf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AlignedBuf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct BufVisitor;

        impl<'de> serde::de::Visitor<'de> for BufVisitor {
            type Value = AlignedBuf;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a non-empty byte buffer")
            }

            fn visit_bytes<E>(self, bytes: &[u8]) -> Result<AlignedBuf, E>
            where
                E: serde::de::Error,
            {
                if bytes.is_empty() {
                    return Err(E::invalid_length(0, &self));
                }
                Ok(AlignedBuf::from_slice(bytes))
            }

            fn visit_byte_buf<E>(self, bytes: Vec<u8>) -> Result<AlignedBuf, E>
            where
                E: serde::de::Error,
            {
                self.visit_bytes(&bytes)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<AlignedBuf, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element()? {
                    bytes.push(byte);
                }
                self.visit_bytes(&bytes)
            }
        }

        deserializer.deserialize_bytes(BufVisitor)
    }
}
