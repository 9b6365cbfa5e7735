//! A split block Bloom filter with SIMD-friendly buckets.

use crate::aligned::AlignedBuf;
use crate::hashing::{HashFamily, TwoIndependentMultiplyShift};
use crate::{Filter, Status};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// log2(bytes per bucket); one bucket is a 256-bit cache-line block.
const LOG_BUCKET_BYTE_SIZE: usize = 5;

const LANES: usize = 8;

// Odd constants for the per-lane multiply-shift rehash.
const REHASH: [u32; LANES] = [
    0x47b6_137b,
    0x4497_4d91,
    0x8824_ad5b,
    0xa2b7_289d,
    0x7054_95c7,
    0x2df1_424b,
    0x9efc_4947,
    0x5c6b_fb31,
];

/// A block Bloom filter where each block is a split Bloom filter confined to
/// one 256-bit cache line, with exactly one bit set per 32-bit lane on every
/// insert.
///
/// One hash picks the block and seeds eight lane-local multiply-shift
/// rehashes, so an insert or lookup touches a single cache line. On x86-64
/// with AVX2 the eight lanes are processed in one vector operation; other
/// targets use an equivalent scalar path.
///
/// There is no deletion and no hard capacity: the filter accepts inserts
/// indefinitely, with the false-positive rate rising as blocks saturate.
/// Confining every key to one block costs a somewhat higher false-positive
/// rate than a classic Bloom filter of the same size, in exchange for
/// single-cache-line operations.
///
/// # Examples
///
/// ```
/// use amq_filters::simd_block::SimdBlockFilter;
/// use amq_filters::{Filter, Status};
///
/// // 2^16 bytes of blocks
/// let mut filter = SimdBlockFilter::new(16);
/// assert_eq!(filter.insert(42), Status::Ok);
/// assert!(filter.contains(42));
/// assert_eq!(filter.remove(42), Status::NotSupported);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SimdBlockFilter<H = TwoIndependentMultiplyShift> {
    log_num_buckets: u32,
    directory_mask: u32,
    directory: AlignedBuf,
    num_items: usize,
    hasher: H,
}

impl SimdBlockFilter {
    /// Constructs a `SimdBlockFilter` consuming at most `2^log_heap_space`
    /// bytes of blocks (with a one-block floor).
    ///
    /// # Panics
    ///
    /// Panics if `log_heap_space` is 38 or more (a quarter-terabyte of
    /// blocks is taken for a miscomputed parameter).
    pub fn new(log_heap_space: usize) -> Self {
        Self::with_hasher(log_heap_space, TwoIndependentMultiplyShift::from_entropy())
    }
}

impl<H> SimdBlockFilter<H>
where
    H: HashFamily,
{
    /// Constructs a `SimdBlockFilter` with an explicit hash family.
    pub fn with_hasher(log_heap_space: usize, hasher: H) -> Self {
        assert!(log_heap_space < 38, "heap budget out of range");
        let log_num_buckets = log_heap_space.saturating_sub(LOG_BUCKET_BYTE_SIZE).max(1) as u32;
        SimdBlockFilter {
            log_num_buckets,
            directory_mask: (1u32 << log_num_buckets) - 1,
            directory: AlignedBuf::new(1 << (log_num_buckets as usize + LOG_BUCKET_BYTE_SIZE)),
            num_items: 0,
            hasher,
        }
    }

    /// Turns a 32-bit hash into a block mask with exactly one bit set per
    /// 32-bit lane: multiply the hash by an odd constant per lane, keep the
    /// top five bits of each product, and shift a one by that amount.
    fn make_mask(hash: u32) -> [u32; LANES] {
        let mut mask = [0u32; LANES];
        for (lane, salt) in REHASH.iter().enumerate() {
            mask[lane] = 1 << (salt.wrapping_mul(hash) >> 27);
        }
        mask
    }

    fn bucket_and_mask_hash(&self, key: u64) -> (usize, u32) {
        let hash = self.hasher.hash(key);
        let bucket_index = (hash & u64::from(self.directory_mask)) as usize;
        (bucket_index, (hash >> self.log_num_buckets) as u32)
    }

    fn lane_offset(bucket_index: usize, lane: usize) -> usize {
        (bucket_index << LOG_BUCKET_BYTE_SIZE) + lane * 4
    }

    /// Inserts a key. Always succeeds; saturating blocks only raise the
    /// false-positive rate.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::simd_block::SimdBlockFilter;
    /// use amq_filters::Status;
    ///
    /// let mut filter = SimdBlockFilter::new(16);
    /// assert_eq!(filter.insert(5), Status::Ok);
    /// ```
    pub fn insert(&mut self, key: u64) -> Status {
        let (bucket_index, mask_hash) = self.bucket_and_mask_hash(key);
        #[cfg(target_arch = "x86_64")]
        if avx2::available() {
            // Safety: AVX2 support was just verified.
            unsafe { avx2::insert(&mut self.directory, bucket_index, mask_hash) };
            self.num_items += 1;
            return Status::Ok;
        }
        let mask = Self::make_mask(mask_hash);
        for (lane, bit) in mask.iter().enumerate() {
            let at = Self::lane_offset(bucket_index, lane);
            let word = u32::from_le_bytes([
                self.directory[at],
                self.directory[at + 1],
                self.directory[at + 2],
                self.directory[at + 3],
            ]) | bit;
            self.directory[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        self.num_items += 1;
        Status::Ok
    }

    /// Checks whether a key is possibly a member: true iff every mask bit
    /// of its block is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::simd_block::SimdBlockFilter;
    ///
    /// let mut filter = SimdBlockFilter::new(16);
    ///
    /// filter.insert(5);
    /// assert!(filter.contains(5));
    /// ```
    pub fn contains(&self, key: u64) -> bool {
        let (bucket_index, mask_hash) = self.bucket_and_mask_hash(key);
        #[cfg(target_arch = "x86_64")]
        if avx2::available() {
            // Safety: AVX2 support was just verified.
            return unsafe { avx2::contains(&self.directory, bucket_index, mask_hash) };
        }
        let mask = Self::make_mask(mask_hash);
        mask.iter().enumerate().all(|(lane, bit)| {
            let at = Self::lane_offset(bucket_index, lane);
            let word = u32::from_le_bytes([
                self.directory[at],
                self.directory[at + 1],
                self.directory[at + 2],
                self.directory[at + 3],
            ]);
            !word & bit == 0
        })
    }

    /// Clears the filter, removing all keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::simd_block::SimdBlockFilter;
    ///
    /// let mut filter = SimdBlockFilter::new(16);
    ///
    /// filter.insert(5);
    /// filter.clear();
    /// assert!(!filter.contains(5));
    /// ```
    pub fn clear(&mut self) {
        self.directory.zero();
        self.num_items = 0;
    }

    /// Returns the number of keys inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::simd_block::SimdBlockFilter;
    ///
    /// let mut filter = SimdBlockFilter::new(16);
    ///
    /// filter.insert(5);
    /// assert_eq!(filter.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.num_items
    }

    /// Returns `true` if no keys have been inserted.
    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// Returns the heap size of the block directory in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.directory.len()
    }

    /// Returns a human-readable summary of the filter.
    pub fn info(&self) -> String {
        format!(
            "SimdBlockFilter status:\n\
             \t\tBlocks: {} x 256 bits\n\
             \t\tKeys stored: {}\n\
             \t\tDirectory size: {} KiB",
            1u64 << self.log_num_buckets,
            self.num_items,
            self.size_in_bytes() >> 10
        )
    }
}

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::{LOG_BUCKET_BYTE_SIZE, REHASH};
    use std::arch::x86_64::{
        __m256i, _mm256_load_si256, _mm256_mullo_epi32, _mm256_or_si256, _mm256_set1_epi32,
        _mm256_setr_epi32, _mm256_sllv_epi32, _mm256_srli_epi32, _mm256_store_si256,
        _mm256_testc_si256,
    };

    pub fn available() -> bool {
        is_x86_feature_detected!("avx2")
    }

    #[target_feature(enable = "avx2")]
    unsafe fn make_mask(hash: u32) -> __m256i {
        let ones = _mm256_set1_epi32(1);
        let rehash = _mm256_setr_epi32(
            REHASH[0] as i32,
            REHASH[1] as i32,
            REHASH[2] as i32,
            REHASH[3] as i32,
            REHASH[4] as i32,
            REHASH[5] as i32,
            REHASH[6] as i32,
            REHASH[7] as i32,
        );
        let mut hash_data = _mm256_set1_epi32(hash as i32);
        hash_data = _mm256_mullo_epi32(rehash, hash_data);
        hash_data = _mm256_srli_epi32(hash_data, 27);
        _mm256_sllv_epi32(ones, hash_data)
    }

    /// Safety: requires AVX2 and `bucket_index` within the directory. The
    /// directory is 64-byte aligned and buckets are 32 bytes, so the
    /// aligned vector load/store are in bounds and aligned.
    #[target_feature(enable = "avx2")]
    pub unsafe fn insert(directory: &mut [u8], bucket_index: usize, hash: u32) {
        let mask = make_mask(hash);
        let bucket =
            directory.as_mut_ptr().add(bucket_index << LOG_BUCKET_BYTE_SIZE) as *mut __m256i;
        _mm256_store_si256(bucket, _mm256_or_si256(_mm256_load_si256(bucket), mask));
    }

    /// Safety: same contract as [`insert`].
    #[target_feature(enable = "avx2")]
    pub unsafe fn contains(directory: &[u8], bucket_index: usize, hash: u32) -> bool {
        let mask = make_mask(hash);
        let bucket = directory.as_ptr().add(bucket_index << LOG_BUCKET_BYTE_SIZE) as *const __m256i;
        // testc is 1 iff every mask bit is set in the bucket
        _mm256_testc_si256(_mm256_load_si256(bucket), mask) != 0
    }

}

impl<H> Filter for SimdBlockFilter<H>
where
    H: HashFamily,
{
    fn insert(&mut self, key: u64) -> Status {
        SimdBlockFilter::insert(self, key)
    }

    fn contains(&self, key: u64) -> bool {
        SimdBlockFilter::contains(self, key)
    }

    fn remove(&mut self, _key: u64) -> Status {
        Status::NotSupported
    }

    fn len(&self) -> usize {
        SimdBlockFilter::len(self)
    }

    fn size_in_bytes(&self) -> usize {
        SimdBlockFilter::size_in_bytes(self)
    }

    fn info(&self) -> String {
        SimdBlockFilter::info(self)
    }
}
