//! The partial-key cuckoo filter.

use crate::cuckoo::table::{Insertion, Table};
use crate::cuckoo::{SingleTable, DEFAULT_BITS_PER_TAG, MAX_CUCKOO_KICKS, TAGS_PER_BUCKET};
use crate::hashing::{HashFamily, TwoIndependentMultiplyShift};
use crate::{Filter, Status};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// MurmurHash2 mixing constant; scrambles the fingerprint into an index
// delta for the alternate bucket.
const ALT_INDEX_SCRAMBLE: u32 = 0x5bd1_e995;

/// The single-slot overflow holding the tag that cuckoo eviction failed to
/// place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
struct Victim {
    index: usize,
    tag: u32,
}

/// A space-efficient probabilistic data structure to test for membership in
/// a set, with the flexibility to remove items.
///
/// A cuckoo filter is a cuckoo hash table storing each key's fingerprint: a
/// short nonzero hash. The alternate bucket of a fingerprint is derived from
/// the fingerprint itself rather than the key (partial-key cuckoo hashing),
/// so keys are never stored. Lookups probe two buckets; inserts displace
/// resident fingerprints along a random walk of at most
/// [`MAX_CUCKOO_KICKS`] steps, after which the wandering fingerprint is
/// parked in a one-slot victim cache and the filter reports itself full on
/// the next insert.
///
/// The bucket storage is pluggable: [`SingleTable`] packs tags directly,
/// [`PackedTable`] semi-sorts buckets to save one bit per tag.
///
/// Removing a key that was never inserted may delete a colliding
/// fingerprint belonging to another key; callers are expected to remove
/// only keys they previously inserted.
///
/// # Examples
///
/// ```
/// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
///
/// let mut filter = CuckooFilter::<SingleTable>::new(100);
///
/// assert!(!filter.contains(17));
/// filter.insert(17);
/// assert!(filter.contains(17));
///
/// filter.remove(17);
/// assert!(!filter.contains(17));
///
/// assert_eq!(filter.len(), 0);
/// ```
///
/// [`PackedTable`]: crate::cuckoo::PackedTable
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct CuckooFilter<T = SingleTable, H = TwoIndependentMultiplyShift> {
    table: T,
    num_items: usize,
    victim: Option<Victim>,
    hasher: H,
    #[cfg_attr(feature = "serde", serde(skip, default = "XorShiftRng::from_entropy"))]
    rng: XorShiftRng,
}

impl<T> CuckooFilter<T>
where
    T: Table,
{
    /// Constructs a `CuckooFilter` sized for `max_num_keys` keys with
    /// 12-bit fingerprints.
    ///
    /// The bucket count is the next power of two fitting `max_num_keys`
    /// four to a bucket, doubled when that would exceed 96% occupancy.
    ///
    /// # Panics
    ///
    /// Panics if `max_num_keys` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, PackedTable, SingleTable};
    ///
    /// let filter = CuckooFilter::<SingleTable>::new(1000);
    /// let packed = CuckooFilter::<PackedTable>::with_bits_per_tag(1000, 13);
    /// ```
    pub fn new(max_num_keys: usize) -> Self {
        Self::with_bits_per_tag(max_num_keys, DEFAULT_BITS_PER_TAG)
    }

    /// Constructs a `CuckooFilter` sized for `max_num_keys` keys with
    /// `bits_per_tag`-bit fingerprints. Wider tags lower the false-positive
    /// rate at the cost of space.
    ///
    /// # Panics
    ///
    /// Panics if `max_num_keys` is 0 or if the table does not support
    /// `bits_per_tag`.
    pub fn with_bits_per_tag(max_num_keys: usize, bits_per_tag: usize) -> Self {
        Self::with_hasher(
            max_num_keys,
            bits_per_tag,
            TwoIndependentMultiplyShift::from_entropy(),
        )
    }
}

impl<T, H> CuckooFilter<T, H>
where
    T: Table,
    H: HashFamily,
{
    /// Constructs a `CuckooFilter` with an explicit hash family. Two
    /// filters built from equal hash families make identical placement
    /// decisions, which is what serialization round-trips rely on.
    ///
    /// # Panics
    ///
    /// Panics if `max_num_keys` is 0 or if the table does not support
    /// `bits_per_tag`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    /// use amq_filters::TwoIndependentMultiplyShift;
    ///
    /// let filter = CuckooFilter::<SingleTable, _>::with_hasher(
    ///     1000,
    ///     12,
    ///     TwoIndependentMultiplyShift::from_seeds(3, 7),
    /// );
    /// ```
    pub fn with_hasher(max_num_keys: usize, bits_per_tag: usize, hasher: H) -> Self {
        assert!(max_num_keys > 0);
        let mut num_buckets = (max_num_keys / TAGS_PER_BUCKET).max(1).next_power_of_two();
        let frac = max_num_keys as f64 / (num_buckets * TAGS_PER_BUCKET) as f64;
        if frac > 0.96 {
            num_buckets <<= 1;
        }
        CuckooFilter {
            table: T::new(num_buckets, bits_per_tag),
            num_items: 0,
            victim: None,
            hasher,
            rng: XorShiftRng::from_entropy(),
        }
    }

    fn index_hash(&self, hash_bits: u32) -> usize {
        // num_buckets is a power of two, so modulo reduces to a mask
        hash_bits as usize & (self.table.num_buckets() - 1)
    }

    fn tag_hash(&self, hash_bits: u32) -> u32 {
        let tag = hash_bits & crate::bits::low_mask(self.table.bits_per_tag()) as u32;
        // 0 marks an empty slot; re-target zero fingerprints
        tag + u32::from(tag == 0)
    }

    fn index_and_tag(&self, key: u64) -> (usize, u32) {
        let hash = self.hasher.hash(key);
        (self.index_hash((hash >> 32) as u32), self.tag_hash(hash as u32))
    }

    fn alt_index(&self, index: usize, tag: u32) -> usize {
        // Deriving the delta from the fingerprint alone is what makes the
        // hashing partial-key: the original key is gone by now. XOR makes
        // this an involution, so alt(alt(i, t), t) == i.
        self.index_hash(index as u32 ^ tag.wrapping_mul(ALT_INDEX_SCRAMBLE))
    }

    /// Places `(index, tag)` into the table, displacing residents along a
    /// random walk; parks the last wanderer in the victim cache when the
    /// walk exhausts its budget. The item is retained either way.
    fn add_impl(&mut self, index: usize, tag: u32) {
        let mut cur_index = index;
        let mut cur_tag = tag;

        for count in 0..MAX_CUCKOO_KICKS {
            let kickout = count > 0;
            match self
                .table
                .insert_tag_to_bucket(cur_index, cur_tag, kickout, &mut self.rng)
            {
                Insertion::Stored => return,
                Insertion::Evicted(old_tag) => cur_tag = old_tag,
                Insertion::Full => {}
            }
            cur_index = self.alt_index(cur_index, cur_tag);
        }

        self.victim = Some(Victim {
            index: cur_index,
            tag: cur_tag,
        });
    }

    /// Inserts a key.
    ///
    /// Returns [`Status::NotEnoughSpace`] without changing anything when
    /// the victim cache is already occupied; otherwise the key is retained
    /// (in a bucket or, after a failed eviction walk, in the victim cache)
    /// and the result is [`Status::Ok`].
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    /// use amq_filters::Status;
    ///
    /// let mut filter = CuckooFilter::<SingleTable>::new(100);
    /// assert_eq!(filter.insert(5), Status::Ok);
    /// ```
    pub fn insert(&mut self, key: u64) -> Status {
        if self.victim.is_some() {
            return Status::NotEnoughSpace;
        }
        let (index, tag) = self.index_and_tag(key);
        self.add_impl(index, tag);
        self.num_items += 1;
        Status::Ok
    }

    /// Checks whether a key is possibly a member. Never mutates the filter
    /// and never reports a false negative.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let mut filter = CuckooFilter::<SingleTable>::new(100);
    ///
    /// filter.insert(5);
    /// assert!(filter.contains(5));
    /// ```
    pub fn contains(&self, key: u64) -> bool {
        let (i1, tag) = self.index_and_tag(key);
        let i2 = self.alt_index(i1, tag);
        debug_assert_eq!(i1, self.alt_index(i2, tag));

        if let Some(victim) = self.victim {
            if tag == victim.tag && (i1 == victim.index || i2 == victim.index) {
                return true;
            }
        }
        self.table.find_tag_in_buckets(i1, i2, tag)
    }

    /// Removes a key.
    ///
    /// Returns [`Status::NotFound`] when the key's fingerprint is in
    /// neither candidate bucket nor the victim cache. After a bucket slot
    /// frees up, a parked victim is re-inserted; it may fit now.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    /// use amq_filters::Status;
    ///
    /// let mut filter = CuckooFilter::<SingleTable>::new(100);
    ///
    /// filter.insert(5);
    /// assert_eq!(filter.remove(5), Status::Ok);
    /// assert_eq!(filter.remove(5), Status::NotFound);
    /// ```
    pub fn remove(&mut self, key: u64) -> Status {
        let (i1, tag) = self.index_and_tag(key);
        let i2 = self.alt_index(i1, tag);

        if self.table.delete_tag_from_bucket(i1, tag)
            || self.table.delete_tag_from_bucket(i2, tag)
        {
            self.num_items -= 1;
            if let Some(victim) = self.victim.take() {
                // already counted in num_items; only its home changes
                self.add_impl(victim.index, victim.tag);
            }
            Status::Ok
        } else if let Some(victim) = self.victim {
            if tag == victim.tag && (i1 == victim.index || i2 == victim.index) {
                self.victim = None;
                self.num_items -= 1;
                Status::Ok
            } else {
                Status::NotFound
            }
        } else {
            Status::NotFound
        }
    }

    /// Clears the filter, removing all keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let mut filter = CuckooFilter::<SingleTable>::new(100);
    /// filter.insert(5);
    /// filter.clear();
    /// assert!(!filter.contains(5));
    /// assert!(filter.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
        self.victim = None;
        self.num_items = 0;
    }

    /// Returns the number of keys currently stored, counting a parked
    /// victim.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let mut filter = CuckooFilter::<SingleTable>::new(100);
    ///
    /// filter.insert(5);
    /// assert_eq!(filter.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.num_items
    }

    /// Returns `true` if the filter stores no keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let filter = CuckooFilter::<SingleTable>::new(100);
    ///
    /// assert!(filter.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// Returns the fraction of slots occupied. The false-positive rate
    /// grows roughly linearly with it.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let mut filter = CuckooFilter::<SingleTable>::new(100);
    ///
    /// filter.insert(5);
    /// assert_eq!(filter.load_factor(), 1.0 / 128.0);
    /// ```
    pub fn load_factor(&self) -> f64 {
        self.num_items as f64 / self.table.size_in_tags() as f64
    }

    /// Returns the heap size of the bucket storage in bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let filter = CuckooFilter::<SingleTable>::new(100);
    ///
    /// // 32 buckets of four 12-bit tags
    /// assert_eq!(filter.size_in_bytes(), 32 * 6);
    /// ```
    pub fn size_in_bytes(&self) -> usize {
        self.table.size_in_bytes()
    }

    /// Returns a reference to the filter's hash family.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
    ///
    /// let filter = CuckooFilter::<SingleTable>::new(100);
    /// let hasher = filter.hasher();
    /// ```
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns a human-readable summary of the filter.
    pub fn info(&self) -> String {
        let bits_per_item = if self.num_items > 0 {
            format!("{:.2}", 8.0 * self.size_in_bytes() as f64 / self.num_items as f64)
        } else {
            "N/A".to_string()
        };
        format!(
            "CuckooFilter status:\n\
             \t\t{}\n\
             \t\tKeys stored: {}\n\
             \t\tLoad factor: {:.4}\n\
             \t\tHashtable size: {} KiB\n\
             \t\tbits/key: {}",
            self.table.info(),
            self.num_items,
            self.load_factor(),
            self.size_in_bytes() >> 10,
            bits_per_item
        )
    }
}

impl<T, H> Filter for CuckooFilter<T, H>
where
    T: Table,
    H: HashFamily,
{
    fn insert(&mut self, key: u64) -> Status {
        CuckooFilter::insert(self, key)
    }

    fn contains(&self, key: u64) -> bool {
        CuckooFilter::contains(self, key)
    }

    fn remove(&mut self, key: u64) -> Status {
        CuckooFilter::remove(self, key)
    }

    fn len(&self) -> usize {
        CuckooFilter::len(self)
    }

    fn size_in_bytes(&self) -> usize {
        CuckooFilter::size_in_bytes(self)
    }

    fn info(&self) -> String {
        CuckooFilter::info(self)
    }
}

impl<T, H> PartialEq for CuckooFilter<T, H>
where
    T: Table + PartialEq,
    H: HashFamily + PartialEq,
{
    fn eq(&self, other: &CuckooFilter<T, H>) -> bool {
        // the eviction RNG does not affect observable membership
        self.num_items == other.num_items
            && self.victim == other.victim
            && self.hasher == other.hasher
            && self.table == other.table
    }
}

#[cfg(test)]
mod tests {
    use super::CuckooFilter;
    use crate::cuckoo::{PackedTable, SingleTable, Table};
    use crate::hashing::tests::{multiply_shift_1, multiply_shift_2};
    use crate::Status;

    #[test]
    fn test_new() {
        let filter = CuckooFilter::<SingleTable>::new(100);
        assert_eq!(filter.len(), 0);
        assert!(filter.is_empty());
        assert_eq!(filter.table.num_buckets(), 32);
        assert_eq!(filter.table.bits_per_tag(), 12);
    }

    #[test]
    fn test_capacity_doubles_near_full() {
        // 127 keys over 32 buckets is 99% occupancy; the constructor must
        // double to 64 buckets.
        let filter = CuckooFilter::<SingleTable>::new(127);
        assert_eq!(filter.table.num_buckets(), 64);

        let filter = CuckooFilter::<SingleTable>::new(120);
        assert_eq!(filter.table.num_buckets(), 32);
    }

    #[test]
    fn test_insert_and_contains() {
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(1000, 12, multiply_shift_1());
        for key in 0..500u64 {
            assert_eq!(filter.insert(key), Status::Ok);
        }
        assert_eq!(filter.len(), 500);
        for key in 0..500u64 {
            assert!(filter.contains(key), "false negative for {}", key);
        }
    }

    #[test]
    fn test_remove_and_accounting() {
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(1000, 12, multiply_shift_1());
        for key in 0..100u64 {
            filter.insert(key);
        }
        for key in 0..100u64 {
            assert_eq!(filter.remove(key), Status::Ok, "key {}", key);
        }
        assert_eq!(filter.len(), 0);

        // After deleting everything, survivors can only be fingerprint
        // collisions; with 12-bit tags over 256 buckets they are rare.
        let survivors = (0..100u64).filter(|&key| filter.contains(key)).count();
        assert!(survivors <= 2, "{} keys survived deletion", survivors);
    }

    #[test]
    fn test_remove_missing() {
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(1000, 16, multiply_shift_1());
        assert_eq!(filter.remove(1), Status::NotFound);
        filter.insert(1);
        assert_eq!(filter.remove(2), Status::NotFound);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_fingerprint_never_zero() {
        let filter = CuckooFilter::<SingleTable>::new(100);
        assert_eq!(filter.tag_hash(0), 1);
        assert_eq!(filter.tag_hash(1), 1);
        assert_eq!(filter.tag_hash(0x1000), 1, "tag must come from the low 12 bits");
        assert_eq!(filter.tag_hash(0xfff), 0xfff);
        for hash_bits in 0..10_000u32 {
            assert_ne!(filter.tag_hash(hash_bits), 0);
        }
    }

    #[test]
    fn test_alt_index_involution() {
        let filter = CuckooFilter::<SingleTable>::new(1 << 16);
        let num_buckets = filter.table.num_buckets();
        for seed in 0..1000usize {
            let index = (seed * 2654435761) % num_buckets;
            let tag = (seed as u32 * 40503 + 1) & 0xfff;
            let tag = tag + u32::from(tag == 0);
            let alt = filter.alt_index(index, tag);
            assert_eq!(filter.alt_index(alt, tag), index);
        }
    }

    #[test]
    fn test_fills_past_94_percent() {
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(1 << 14, 12, multiply_shift_1());
        let capacity = filter.table.size_in_tags();

        let mut inserted = 0u64;
        loop {
            if filter.insert(inserted) == Status::NotEnoughSpace {
                break;
            }
            inserted += 1;
        }
        assert!(
            inserted as f64 >= 0.94 * capacity as f64,
            "only filled {} of {} slots",
            inserted,
            capacity
        );
        for key in 0..inserted {
            assert!(filter.contains(key), "false negative for {}", key);
        }
    }

    #[test]
    fn test_false_positive_rate_b12() {
        let capacity = 1 << 16;
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(capacity, 12, multiply_shift_1());
        let target = (0.95 * filter.table.size_in_tags() as f64) as u64;
        for key in 0..target {
            if filter.insert(key) == Status::NotEnoughSpace {
                break;
            }
        }

        let queries = 1u64 << 16;
        let false_positives = (0..queries)
            .map(|i| target + i)
            .filter(|&key| filter.contains(key))
            .count();
        let rate = false_positives as f64 / queries as f64;
        assert!(
            (0.0005..0.005).contains(&rate),
            "false positive rate {} out of range",
            rate
        );
    }

    #[test]
    fn test_false_positive_rate_b13_packed() {
        let capacity = 1 << 16;
        let mut filter =
            CuckooFilter::<PackedTable, _>::with_hasher(capacity, 13, multiply_shift_1());
        let target = (0.95 * filter.table.size_in_tags() as f64) as u64;
        let mut inserted = 0;
        for key in 0..target {
            if filter.insert(key) == Status::NotEnoughSpace {
                break;
            }
            inserted += 1;
        }
        for key in 0..inserted {
            assert!(filter.contains(key), "false negative for {}", key);
        }

        let queries = 1u64 << 16;
        let false_positives = (0..queries)
            .map(|i| target + i)
            .filter(|&key| filter.contains(key))
            .count();
        let rate = false_positives as f64 / queries as f64;
        assert!(
            (0.00025..0.0025).contains(&rate),
            "false positive rate {} out of range",
            rate
        );
    }

    #[test]
    fn test_packed_all_supported_widths() {
        for bits_per_tag in crate::cuckoo::SUPPORTED_BITS_PER_TAG {
            let mut filter = CuckooFilter::<PackedTable, _>::with_hasher(
                1000,
                bits_per_tag,
                multiply_shift_1(),
            );
            for key in 0..200u64 {
                assert_eq!(filter.insert(key), Status::Ok, "b={}", bits_per_tag);
            }
            for key in 0..200u64 {
                assert!(filter.contains(key), "b={} key {}", bits_per_tag, key);
            }
            for key in 0..200u64 {
                assert_eq!(filter.remove(key), Status::Ok, "b={}", bits_per_tag);
            }
            assert!(filter.is_empty(), "b={}", bits_per_tag);
        }
    }

    #[test]
    fn test_packed_saves_space_at_same_width() {
        let single = CuckooFilter::<SingleTable>::with_bits_per_tag(1 << 16, 13);
        let packed = CuckooFilter::<PackedTable>::with_bits_per_tag(1 << 16, 13);
        assert!(packed.size_in_bytes() < single.size_in_bytes());
    }

    #[test]
    fn test_victim_cache_saturation() {
        // Tiny filter with 1 bucket: the fifth insert lands in the victim
        // cache, the sixth reports NotEnoughSpace.
        let mut filter = CuckooFilter::<SingleTable, _>::with_hasher(3, 12, multiply_shift_1());
        assert_eq!(filter.table.num_buckets(), 1);

        let mut statuses = Vec::new();
        for key in 0..6u64 {
            statuses.push(filter.insert(key));
        }
        assert_eq!(statuses[..5], [Status::Ok; 5]);
        assert_eq!(statuses[5], Status::NotEnoughSpace);
        assert_eq!(filter.len(), 5);
        assert!(filter.victim.is_some());
        for key in 0..5u64 {
            assert!(filter.contains(key), "false negative for {}", key);
        }

        // Freeing a slot promotes the victim back into the table.
        assert_eq!(filter.remove(0), Status::Ok);
        assert_eq!(filter.len(), 4);
        assert!(filter.victim.is_none());
        for key in 1..5u64 {
            assert!(filter.contains(key), "false negative for {}", key);
        }
        assert_eq!(filter.insert(6), Status::Ok);
    }

    #[test]
    fn test_insert_same_key_many_times() {
        // Copies of one key exhaust its two candidate buckets (eight slots,
        // or four when the alternate index coincides), then one copy parks
        // in the victim cache and the next insert reports a full filter.
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(1000, 12, multiply_shift_1());
        let mut copies = 0;
        while filter.insert(7) == Status::Ok {
            copies += 1;
            assert!(copies <= 9);
        }
        assert!(copies == 5 || copies == 9);
        assert_eq!(filter.len(), copies);
        assert!(filter.victim.is_some());
        assert!(filter.contains(7));
    }

    #[test]
    fn test_clear() {
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(1000, 12, multiply_shift_1());
        for key in 0..100u64 {
            filter.insert(key);
        }
        filter.clear();
        assert!(filter.is_empty());
        for key in 0..100u64 {
            assert!(!filter.contains(key));
        }
    }

    #[test]
    fn test_tabulation_hasher() {
        let mut filter = CuckooFilter::<SingleTable, _>::with_hasher(
            1000,
            12,
            crate::SimpleTabulation::from_seed(11),
        );
        for key in 0..500u64 {
            filter.insert(key);
        }
        for key in 0..500u64 {
            assert!(filter.contains(key));
        }
    }

    #[test]
    fn test_eq_ignores_rng() {
        let mut a = CuckooFilter::<SingleTable, _>::with_hasher(100, 12, multiply_shift_1());
        let mut b = CuckooFilter::<SingleTable, _>::with_hasher(100, 12, multiply_shift_1());
        let c = CuckooFilter::<SingleTable, _>::with_hasher(100, 12, multiply_shift_2());
        for key in 0..50u64 {
            a.insert(key);
            b.insert(key);
        }
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_info() {
        let mut filter = CuckooFilter::<SingleTable>::new(100);
        assert!(filter.info().contains("bits/key: N/A"));
        filter.insert(1);
        assert!(filter.info().contains("Keys stored: 1"));
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        let _ = CuckooFilter::<SingleTable>::new(0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de() {
        let mut filter =
            CuckooFilter::<SingleTable, _>::with_hasher(10_000, 12, multiply_shift_1());
        for key in 0..5000u64 {
            filter.insert(key);
        }

        let serialized = bincode::serialize(&filter).unwrap();
        let mut de: CuckooFilter<SingleTable, _> = bincode::deserialize(&serialized).unwrap();
        assert_eq!(filter, de);

        for key in 0..20_000u64 {
            assert_eq!(filter.contains(key), de.contains(key), "key {}", key);
        }

        // the restored filter keeps working
        de.insert(99_999);
        assert!(de.contains(99_999));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_ser_de_packed_with_victim() {
        let mut filter = CuckooFilter::<PackedTable, _>::with_hasher(4, 13, multiply_shift_1());
        let mut inserted = 0u64;
        while filter.insert(inserted) == Status::Ok {
            inserted += 1;
            assert!(inserted < 100);
        }
        assert!(filter.victim.is_some());

        let serialized = bincode::serialize(&filter).unwrap();
        let de: CuckooFilter<PackedTable, _> = bincode::deserialize(&serialized).unwrap();
        assert_eq!(filter, de);
        for key in 0..inserted {
            assert!(de.contains(key));
        }
    }
}
