//! Plain bit-packed bucket storage.

use crate::aligned::AlignedBuf;
use crate::bits;
use crate::cuckoo::table::{Insertion, Table};
use crate::cuckoo::TAGS_PER_BUCKET;
use rand::Rng;
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Tail padding so the SWAR probes can read a full 64-bit word starting
// anywhere inside the last logical bucket.
const PADDING_BYTES: usize = 7;

/// The most direct table layout: one contiguous bit array of `b`-bit tags,
/// four per bucket, little-endian packed.
///
/// Supports any tag width from 1 to 32 bits. For the widths 4, 8, 12, and
/// 16 a lookup probes all four slots of a bucket with a single SWAR
/// has-value test on one unaligned 64-bit read; other widths fall back to a
/// four-iteration scan.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SingleTable {
    buckets: AlignedBuf,
    num_buckets: usize,
    bits_per_tag: usize,
    bytes_per_bucket: usize,
    tag_mask: u32,
}

impl SingleTable {
    /// Reads the `j`-th tag of bucket `i`.
    pub fn read_tag(&self, i: usize, j: usize) -> u32 {
        let bit = i * self.bytes_per_bucket * 8 + j * self.bits_per_tag;
        let word = bits::read_u64_le(&self.buckets, bit >> 3);
        (word >> (bit & 7)) as u32 & self.tag_mask
    }

    /// Writes the `j`-th tag of bucket `i`, preserving its neighbors.
    pub fn write_tag(&mut self, i: usize, j: usize, tag: u32) {
        let bit = i * self.bytes_per_bucket * 8 + j * self.bits_per_tag;
        let shift = bit & 7;
        let mut word = bits::read_u64_le(&self.buckets, bit >> 3);
        word &= !(u64::from(self.tag_mask) << shift);
        word |= u64::from(tag & self.tag_mask) << shift;
        bits::write_u64_le(&mut self.buckets, bit >> 3, word);
    }

    /// Checks whether `tag` occupies a slot of bucket `i`.
    pub fn find_tag_in_bucket(&self, i: usize, tag: u32) -> bool {
        let word = bits::read_u64_le(&self.buckets, i * self.bytes_per_bucket);
        match self.bits_per_tag {
            4 => bits::has_value4(word, tag),
            8 => bits::has_value8(word, tag),
            12 => bits::has_value12(word, tag),
            16 => bits::has_value16(word, tag),
            _ => (0..TAGS_PER_BUCKET).any(|j| self.read_tag(i, j) == tag),
        }
    }

    /// Returns the number of occupied slots in bucket `i`.
    pub fn num_tags_in_bucket(&self, i: usize) -> usize {
        (0..TAGS_PER_BUCKET).filter(|&j| self.read_tag(i, j) != 0).count()
    }
}

impl Table for SingleTable {
    fn new(num_buckets: usize, bits_per_tag: usize) -> Self {
        assert!(num_buckets.is_power_of_two());
        assert!(
            (1..=32).contains(&bits_per_tag),
            "unsupported tag width: {} bits",
            bits_per_tag
        );
        let bytes_per_bucket = (bits_per_tag * TAGS_PER_BUCKET + 7) >> 3;
        SingleTable {
            buckets: AlignedBuf::new(bytes_per_bucket * num_buckets + PADDING_BYTES),
            num_buckets,
            bits_per_tag,
            bytes_per_bucket,
            tag_mask: bits::low_mask(bits_per_tag) as u32,
        }
    }

    fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    fn bits_per_tag(&self) -> usize {
        self.bits_per_tag
    }

    fn size_in_bytes(&self) -> usize {
        self.bytes_per_bucket * self.num_buckets
    }

    fn find_tag_in_buckets(&self, i1: usize, i2: usize, tag: u32) -> bool {
        match self.bits_per_tag {
            4 | 8 | 12 | 16 => {
                let v1 = bits::read_u64_le(&self.buckets, i1 * self.bytes_per_bucket);
                let v2 = bits::read_u64_le(&self.buckets, i2 * self.bytes_per_bucket);
                match self.bits_per_tag {
                    4 => bits::has_value4(v1, tag) || bits::has_value4(v2, tag),
                    8 => bits::has_value8(v1, tag) || bits::has_value8(v2, tag),
                    12 => bits::has_value12(v1, tag) || bits::has_value12(v2, tag),
                    _ => bits::has_value16(v1, tag) || bits::has_value16(v2, tag),
                }
            }
            _ => (0..TAGS_PER_BUCKET)
                .any(|j| self.read_tag(i1, j) == tag || self.read_tag(i2, j) == tag),
        }
    }

    fn delete_tag_from_bucket(&mut self, i: usize, tag: u32) -> bool {
        for j in 0..TAGS_PER_BUCKET {
            if self.read_tag(i, j) == tag {
                self.write_tag(i, j, 0);
                return true;
            }
        }
        false
    }

    fn insert_tag_to_bucket(
        &mut self,
        i: usize,
        tag: u32,
        kickout: bool,
        rng: &mut XorShiftRng,
    ) -> Insertion {
        for j in 0..TAGS_PER_BUCKET {
            if self.read_tag(i, j) == 0 {
                self.write_tag(i, j, tag);
                return Insertion::Stored;
            }
        }
        if kickout {
            let victim_slot = rng.gen_range(0..TAGS_PER_BUCKET);
            let old_tag = self.read_tag(i, victim_slot);
            self.write_tag(i, victim_slot, tag);
            Insertion::Evicted(old_tag)
        } else {
            Insertion::Full
        }
    }

    fn clear(&mut self) {
        self.buckets.zero();
    }

    fn info(&self) -> String {
        format!(
            "SingleTable with tag size: {} bits\n\
             \t\tAssociativity: {}\n\
             \t\tTotal # of rows: {}\n\
             \t\tTotal # of slots: {}",
            self.bits_per_tag,
            TAGS_PER_BUCKET,
            self.num_buckets,
            self.size_in_tags()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::SingleTable;
    use crate::cuckoo::table::{Insertion, Table};
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    fn random_tag(rng: &mut XorShiftRng, bits_per_tag: usize) -> u32 {
        let mask = crate::bits::low_mask(bits_per_tag) as u32;
        loop {
            let tag = rng.gen::<u32>() & mask;
            if tag != 0 {
                return tag;
            }
        }
    }

    #[test]
    fn test_read_write_round_trip() {
        for bits_per_tag in [2, 4, 7, 8, 12, 16, 23, 32] {
            let mut rng = XorShiftRng::seed_from_u64(0x5eed + bits_per_tag as u64);
            let num_buckets = 64;
            let mut table = SingleTable::new(num_buckets, bits_per_tag);
            let mut expected = vec![[0u32; 4]; num_buckets];

            for i in 0..num_buckets {
                for j in 0..4 {
                    let tag = random_tag(&mut rng, bits_per_tag);
                    table.write_tag(i, j, tag);
                    expected[i][j] = tag;
                }
            }
            for i in 0..num_buckets {
                for j in 0..4 {
                    assert_eq!(table.read_tag(i, j), expected[i][j], "b={}", bits_per_tag);
                }
            }
        }
    }

    #[test]
    fn test_overwrite_preserves_neighbors() {
        let mut table = SingleTable::new(8, 12);
        table.write_tag(3, 0, 0xaaa);
        table.write_tag(3, 1, 0xbbb);
        table.write_tag(3, 2, 0xccc);
        table.write_tag(3, 3, 0xddd);
        table.write_tag(3, 1, 0x123);
        assert_eq!(table.read_tag(3, 0), 0xaaa);
        assert_eq!(table.read_tag(3, 1), 0x123);
        assert_eq!(table.read_tag(3, 2), 0xccc);
        assert_eq!(table.read_tag(3, 3), 0xddd);
        // adjacent buckets untouched
        assert_eq!(table.num_tags_in_bucket(2), 0);
        assert_eq!(table.num_tags_in_bucket(4), 0);
    }

    #[test]
    fn test_find_tag_swar_and_scan() {
        for bits_per_tag in [4, 8, 12, 16, 10] {
            let mut table = SingleTable::new(16, bits_per_tag);
            let tag = 0b101u32;
            table.write_tag(5, 2, tag);
            assert!(table.find_tag_in_bucket(5, tag), "b={}", bits_per_tag);
            assert!(!table.find_tag_in_bucket(5, tag ^ 1), "b={}", bits_per_tag);
            assert!(!table.find_tag_in_bucket(4, tag), "b={}", bits_per_tag);
            assert!(table.find_tag_in_buckets(5, 6, tag));
            assert!(table.find_tag_in_buckets(6, 5, tag));
            assert!(!table.find_tag_in_buckets(6, 7, tag));
        }
    }

    #[test]
    fn test_find_does_not_cross_bucket_boundary() {
        // b=12: the probe reads 64 bits but the bucket is only 48; tags in
        // the next bucket must not match.
        let mut table = SingleTable::new(8, 12);
        table.write_tag(1, 0, 0xfed);
        assert!(!table.find_tag_in_bucket(0, 0xfed));
        assert!(table.find_tag_in_bucket(1, 0xfed));
    }

    #[test]
    fn test_delete_clears_one_slot() {
        let mut table = SingleTable::new(8, 8);
        table.write_tag(2, 0, 0x42);
        table.write_tag(2, 1, 0x42);
        assert!(table.delete_tag_from_bucket(2, 0x42));
        assert_eq!(table.num_tags_in_bucket(2), 1);
        assert!(table.delete_tag_from_bucket(2, 0x42));
        assert_eq!(table.num_tags_in_bucket(2), 0);
        assert!(!table.delete_tag_from_bucket(2, 0x42));
    }

    #[test]
    fn test_insert_fills_then_kicks() {
        let mut rng = XorShiftRng::seed_from_u64(1);
        let mut table = SingleTable::new(8, 8);
        for tag in 1..=4u32 {
            assert_eq!(table.insert_tag_to_bucket(0, tag, false, &mut rng), Insertion::Stored);
        }
        assert_eq!(table.insert_tag_to_bucket(0, 5, false, &mut rng), Insertion::Full);
        assert_eq!(table.num_tags_in_bucket(0), 4);

        match table.insert_tag_to_bucket(0, 5, true, &mut rng) {
            Insertion::Evicted(old_tag) => {
                assert!((1..=4).contains(&old_tag));
                assert!(table.find_tag_in_bucket(0, 5));
                assert!(!table.find_tag_in_bucket(0, old_tag) || old_tag == 5);
            }
            outcome => panic!("expected eviction, got {:?}", outcome),
        }
    }

    #[test]
    fn test_clear() {
        let mut table = SingleTable::new(8, 12);
        table.write_tag(0, 0, 1);
        table.write_tag(7, 3, 0xfff);
        table.clear();
        assert_eq!(table.num_tags_in_bucket(0), 0);
        assert_eq!(table.num_tags_in_bucket(7), 0);
    }

    #[test]
    #[should_panic]
    fn test_unsupported_width_panics() {
        let _ = SingleTable::new(8, 33);
    }

    #[test]
    #[should_panic]
    fn test_non_power_of_two_panics() {
        let _ = SingleTable::new(12, 8);
    }
}
