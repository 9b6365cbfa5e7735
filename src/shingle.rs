//! A cuckoo filter with overlapping (shingled) buckets.

use crate::aligned::AlignedBuf;
use crate::bits;
use crate::hashing::{HashFamily, TwoIndependentMultiplyShift};
use crate::{Filter, Status};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const FINGERPRINT_BITS: usize = 11;
const FINGERPRINT_MASK: u16 = (1 << FINGERPRINT_BITS) - 1;

// Refuse inserts past this occupancy; the eviction walk is unbounded and
// only the load factor keeps it short.
const MAX_LOAD: f64 = 12.0 / 12.75;

/// A membership filter based on 3.5-way cuckoo hashing: each logical bucket
/// overlaps the next, which pushes the usable load factor past 94% with
/// 12-bit cells.
///
/// Two arrays `A` and `B` of equal power-of-two length are interleaved in
/// three-byte groups: group `i` holds `A[i]` in its low 12 bits and `B[i]`
/// in its high 12 bits. A cell stores an 11-bit fingerprint and an offset
/// bit meaning "this fingerprint hashed to the previous index and was
/// shifted one slot forward". A key's candidates are `A[i]`, `A[i+1]` and,
/// at a re-derived index, `B[j]`, `B[j+1]`. Inserts shift offset-free
/// neighbors forward robin-hood style before falling back to a random
/// eviction walk that alternates between the two arrays.
///
/// As with any cuckoo filter, removing a key that was never inserted may
/// delete a colliding fingerprint.
///
/// # Examples
///
/// ```
/// use amq_filters::shingle::Shingle;
/// use amq_filters::{Filter, Status};
///
/// // 2^14 slots across both arrays
/// let mut filter = Shingle::new(14);
/// assert_eq!(filter.insert(42), Status::Ok);
/// assert!(filter.contains(42));
/// assert_eq!(filter.remove(42), Status::Ok);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Shingle<H = TwoIndependentMultiplyShift> {
    hasher: H,
    // Each array holds half of the slots; index_mask is one less than that
    // length.
    index_mask: usize,
    // Delta-universal multiply-shift seed deriving the B-side index from
    // the A-side index and the fingerprint.
    fp_hash: u64,
    data: AlignedBuf,
    filled: usize,
    #[cfg_attr(feature = "serde", serde(skip, default = "XorShiftRng::from_entropy"))]
    rng: XorShiftRng,
}

impl Shingle {
    /// Constructs a `Shingle` with `2^log2_slots` cells split evenly
    /// between the two arrays.
    ///
    /// # Panics
    ///
    /// Panics unless `1 <= log2_slots < 48`.
    pub fn new(log2_slots: usize) -> Self {
        Self::with_hasher(log2_slots, TwoIndependentMultiplyShift::from_entropy())
    }
}

impl<H> Shingle<H>
where
    H: HashFamily,
{
    /// Constructs a `Shingle` with an explicit hash family.
    pub fn with_hasher(log2_slots: usize, hasher: H) -> Self {
        assert!((1..48).contains(&log2_slots), "slot count out of range");
        let index_mask = (1usize << (log2_slots - 1)) - 1;
        // Three spare groups at the end keep the robin-hood probes and the
        // unaligned 64-bit reads of `contains` in bounds.
        let data = AlignedBuf::new(3 * (index_mask + 4));
        Shingle {
            hasher,
            index_mask,
            fp_hash: rand::thread_rng().gen(),
            data,
            filled: 0,
            rng: XorShiftRng::from_entropy(),
        }
    }

    /// Reads the 12-bit cell at index `i` of array A (`is_a`) or B.
    fn cell(&self, is_a: bool, i: usize) -> u16 {
        let at = 3 * i + usize::from(!is_a);
        let group = bits::read_u16_le(&self.data, at);
        if is_a {
            group & 0x0fff
        } else {
            group >> 4
        }
    }

    /// Writes the 12-bit cell at index `i`, preserving the neighboring
    /// nibble of the other array.
    fn set_cell(&mut self, is_a: bool, i: usize, cell: u16) {
        let at = 3 * i + usize::from(!is_a);
        let group = bits::read_u16_le(&self.data, at);
        let group = if is_a {
            cell | (group & 0xf000)
        } else {
            (cell << 4) | (group & 0x000f)
        };
        bits::write_u16_le(&mut self.data, at, group);
    }

    fn re_index(&self, index: usize, fp: u16) -> usize {
        (index ^ (self.fp_hash.wrapping_mul(u64::from(fp)) >> FINGERPRINT_BITS) as usize)
            & self.index_mask
    }

    fn index_and_fingerprint(&self, key: u64) -> (usize, u16) {
        let hash = self.hasher.hash(key);
        let index = (hash >> FINGERPRINT_BITS) as usize & self.index_mask;
        let fp = hash as u16 & FINGERPRINT_MASK;
        // 0 marks an empty cell; re-target zero fingerprints
        (index, fp + u16::from(fp == 0))
    }

    /// Writes `fp` (encoded with `offset`) at `index + offset` and returns
    /// the home index and bare fingerprint of the previous occupant.
    fn swap_cell(&mut self, is_a: bool, index: usize, offset: usize, fp: u16) -> (usize, u16) {
        let slot = index + offset;
        let previous = self.cell(is_a, slot);
        let mut home = slot;
        if previous & 1 != 0 {
            home -= 1;
        }
        self.set_cell(is_a, slot, offset as u16 | fp << 1);
        (home, previous >> 1)
    }

    /// Places `fp` in one of its two slots of the current array, shifting
    /// offset-free neighbors forward first, then evicting a random occupant
    /// and continuing the walk in the other array.
    fn place(&mut self, is_a: bool, index: usize, fp: u16) {
        for offset in 0..2usize {
            let slot = index + offset;
            if self.cell(is_a, slot) == 0 {
                self.set_cell(is_a, slot, offset as u16 | fp << 1);
                self.filled += 1;
                return;
            }
        }

        // Push offset-free items of the next two buckets one slot forward,
        // ala robin-hood linear probing.
        if self.cell(is_a, index + 1) & 0x1 == 0 {
            if self.cell(is_a, index + 2) == 0 {
                let shifted = 0x1 | self.cell(is_a, index + 1);
                self.set_cell(is_a, index + 2, shifted);
                self.set_cell(is_a, index + 1, 0x1 | fp << 1);
                self.filled += 1;
                return;
            } else if self.cell(is_a, index + 2) & 0x1 == 0 && self.cell(is_a, index + 3) == 0 {
                let second = 0x1 | self.cell(is_a, index + 2);
                self.set_cell(is_a, index + 3, second);
                let first = 0x1 | self.cell(is_a, index + 1);
                self.set_cell(is_a, index + 2, first);
                self.set_cell(is_a, index + 1, 0x1 | fp << 1);
                self.filled += 1;
                return;
            }
        }

        // Kick out a random key from the two slots and retry in the other
        // array. The walk is a random search; the load cap bounds its
        // expected length.
        let offset = self.rng.gen_range(0..2usize);
        let (home, evicted_fp) = self.swap_cell(is_a, index, offset, fp);
        let next_index = self.re_index(home, evicted_fp);
        self.place(!is_a, next_index, evicted_fp);
    }

    fn erase(&mut self, is_a: bool, index: usize, fp: u16) -> bool {
        for offset in 0..2usize {
            let slot = index + offset;
            if self.cell(is_a, slot) == offset as u16 | fp << 1 {
                self.set_cell(is_a, slot, 0);
                return true;
            }
        }
        if is_a {
            return self.erase(false, self.re_index(index, fp), fp);
        }
        false
    }

    /// Inserts a key. Refuses with [`Status::NotEnoughSpace`] once
    /// occupancy exceeds 12/12.75 (about 94%), the point past which the
    /// eviction walk stops terminating quickly.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::shingle::Shingle;
    /// use amq_filters::Status;
    ///
    /// let mut filter = Shingle::new(14);
    /// assert_eq!(filter.insert(5), Status::Ok);
    /// ```
    pub fn insert(&mut self, key: u64) -> Status {
        if self.filled as f64 / (2 * (self.index_mask + 1)) as f64 > MAX_LOAD {
            return Status::NotEnoughSpace;
        }
        let (index, fp) = self.index_and_fingerprint(key);
        self.place(true, index, fp);
        Status::Ok
    }

    /// Checks whether a key is possibly a member.
    ///
    /// Both arrays are probed with one unaligned 64-bit read each; a SWAR
    /// has-value test checks the offset-0 and offset-1 encodings of the
    /// fingerprint across all four candidate cells at once.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::shingle::Shingle;
    ///
    /// let mut filter = Shingle::new(14);
    ///
    /// filter.insert(5);
    /// assert!(filter.contains(5));
    /// ```
    pub fn contains(&self, key: u64) -> bool {
        let (index, fp) = self.index_and_fingerprint(key);
        let index2 = self.re_index(index, fp);

        const A_SLOTS_MASK: u64 = 0xfff | 0xfff << 24;
        const B_SLOTS_MASK: u64 = A_SLOTS_MASK << 12;

        let slots_a = !A_SLOTS_MASK | bits::read_u64_le(&self.data, 3 * index);
        let slots_b = !B_SLOTS_MASK | bits::read_u64_le(&self.data, 3 * index2);
        let slots_all = slots_a & slots_b;

        // fp << 1 in every candidate lane, with the offset bit expected in
        // the two `index + 1` lanes.
        let mut fp_all = u64::from(fp).wrapping_mul(0x0020_0200_2002);
        fp_all |= 0x0010_0100_0000;

        bits::has_zero12(fp_all ^ slots_all) != 0
    }

    /// Removes a key, returning [`Status::NotFound`] when neither encoding
    /// of its fingerprint is present in either array.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::shingle::Shingle;
    /// use amq_filters::Status;
    ///
    /// let mut filter = Shingle::new(14);
    ///
    /// filter.insert(5);
    /// assert_eq!(filter.remove(5), Status::Ok);
    /// assert_eq!(filter.remove(5), Status::NotFound);
    /// ```
    pub fn remove(&mut self, key: u64) -> Status {
        let (index, fp) = self.index_and_fingerprint(key);
        if self.erase(true, index, fp) {
            self.filled -= 1;
            Status::Ok
        } else {
            Status::NotFound
        }
    }

    /// Clears the filter, removing all keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::shingle::Shingle;
    ///
    /// let mut filter = Shingle::new(14);
    ///
    /// filter.insert(5);
    /// filter.clear();
    /// assert!(!filter.contains(5));
    /// ```
    pub fn clear(&mut self) {
        self.data.zero();
        self.filled = 0;
    }

    /// Returns the number of keys currently stored.
    ///
    /// # Examples
    ///
    /// ```
    /// use amq_filters::shingle::Shingle;
    ///
    /// let mut filter = Shingle::new(14);
    ///
    /// filter.insert(5);
    /// assert_eq!(filter.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.filled
    }

    /// Returns `true` if the filter stores no keys.
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Returns the heap size of the cell storage in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    /// Returns a human-readable summary of the filter.
    pub fn info(&self) -> String {
        format!(
            "Shingle status:\n\
             \t\tSlots: {} x 12 bits (two overlapping arrays)\n\
             \t\tKeys stored: {}\n\
             \t\tLoad factor: {:.4}",
            2 * (self.index_mask + 1),
            self.filled,
            self.filled as f64 / (2 * (self.index_mask + 1)) as f64
        )
    }
}

impl<H> Filter for Shingle<H>
where
    H: HashFamily,
{
    fn insert(&mut self, key: u64) -> Status {
        Shingle::insert(self, key)
    }

    fn contains(&self, key: u64) -> bool {
        Shingle::contains(self, key)
    }

    fn remove(&mut self, key: u64) -> Status {
        Shingle::remove(self, key)
    }

    fn len(&self) -> usize {
        Shingle::len(self)
    }

    fn size_in_bytes(&self) -> usize {
        Shingle::size_in_bytes(self)
    }

    fn info(&self) -> String {
        Shingle::info(self)
    }
}
