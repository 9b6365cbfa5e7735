//! Semi-sorted bucket storage using permutation encoding.

use crate::aligned::AlignedBuf;
use crate::bits;
use crate::cuckoo::perm_encoding::PermEncoding;
use crate::cuckoo::table::{Insertion, Table};
use crate::cuckoo::TAGS_PER_BUCKET;
use rand::Rng;
use rand_xorshift::XorShiftRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tag widths the packed layout supports. The bucket widths these induce
/// (16, 20, 24, 28, 32, 48, and 64 bits) keep every bucket within one
/// unaligned 64-bit read.
pub const SUPPORTED_BITS_PER_TAG: [usize; 7] = [5, 6, 7, 8, 9, 13, 17];

// Tail padding for the unaligned 64-bit bucket reads.
const PADDING_BYTES: usize = 7;

/// Bucket storage that spends one bit less per tag than [`SingleTable`] by
/// canonicalizing slot order.
///
/// Each bucket stores the four low nibbles of its tags as a 12-bit
/// permutation codeword plus `4 * (b - 4)` direct bits, so a bucket takes
/// `12 + 4 * (b - 4)` bits instead of `4 * b`. Every write re-sorts the
/// bucket by low nibble; slot order is not preserved, which is fine because
/// slot order carries no meaning in a cuckoo filter.
///
/// [`SingleTable`]: crate::cuckoo::SingleTable
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct PackedTable {
    buckets: AlignedBuf,
    num_buckets: usize,
    bits_per_tag: usize,
    dir_bits_per_tag: usize,
    bits_per_bucket: usize,
    dir_bits_mask: u32,
    len: usize,
}

impl PackedTable {
    fn bucket_offset(&self, i: usize) -> (usize, usize) {
        let bit = self.bits_per_bucket * i;
        (bit >> 3, bit & 7)
    }

    /// Reads and decodes bucket `i`. The returned tags are in canonical
    /// order: low nibbles non-decreasing.
    pub fn read_bucket(&self, i: usize) -> [u32; 4] {
        let (byte, shift) = self.bucket_offset(i);
        let bucket_bits = bits::read_u64_le(&self.buckets, byte) >> shift;
        self.decode_bucket_bits(bucket_bits)
    }

    fn decode_bucket_bits(&self, bucket_bits: u64) -> [u32; 4] {
        // codeword is the lowest 12 bits in the bucket
        let codeword = (bucket_bits & 0xfff) as u16;
        let mut tags = [0u32; 4];
        for (j, tag) in tags.iter_mut().enumerate() {
            *tag = (bucket_bits >> (8 + j * self.dir_bits_per_tag)) as u32 & self.dir_bits_mask;
        }
        let lowbits = PermEncoding::shared().decode(codeword);
        for (tag, low) in tags.iter_mut().zip(lowbits) {
            *tag |= u32::from(low);
        }
        tags
    }

    /// Encodes and writes bucket `i`, first canonicalizing slot order when
    /// `sort` is set. The masked write preserves neighboring buckets.
    pub fn write_bucket(&mut self, i: usize, mut tags: [u32; 4], sort: bool) {
        if sort {
            sort_tags(&mut tags);
        }

        let lowbits = [
            (tags[0] & 0x0f) as u8,
            (tags[1] & 0x0f) as u8,
            (tags[2] & 0x0f) as u8,
            (tags[3] & 0x0f) as u8,
        ];
        let codeword = PermEncoding::shared().encode(lowbits);

        let mut bucket_bits = u64::from(codeword);
        for (j, tag) in tags.iter().enumerate() {
            bucket_bits |= u64::from(tag & 0xffff_fff0) << (8 + j * self.dir_bits_per_tag);
        }

        let (byte, shift) = self.bucket_offset(i);
        let mut word = bits::read_u64_le(&self.buckets, byte);
        word &= !(bits::low_mask(self.bits_per_bucket) << shift);
        word |= bucket_bits << shift;
        bits::write_u64_le(&mut self.buckets, byte, word);
    }

    /// Checks whether `tag` occupies a slot of bucket `i`.
    pub fn find_tag_in_bucket(&self, i: usize, tag: u32) -> bool {
        self.read_bucket(i).contains(&tag)
    }

    /// Returns the number of occupied slots in bucket `i`.
    pub fn num_tags_in_bucket(&self, i: usize) -> usize {
        self.read_bucket(i).iter().filter(|&&tag| tag != 0).count()
    }
}

/// Sorts four tags by low nibble with a five-comparator network.
fn sort_tags(tags: &mut [u32; 4]) {
    sort_pair(tags, 0, 2);
    sort_pair(tags, 1, 3);
    sort_pair(tags, 0, 1);
    sort_pair(tags, 2, 3);
    sort_pair(tags, 1, 2);
}

fn sort_pair(tags: &mut [u32; 4], a: usize, b: usize) {
    if (tags[a] & 0x0f) > (tags[b] & 0x0f) {
        tags.swap(a, b);
    }
}

impl Table for PackedTable {
    fn new(num_buckets: usize, bits_per_tag: usize) -> Self {
        assert!(num_buckets.is_power_of_two());
        assert!(
            SUPPORTED_BITS_PER_TAG.contains(&bits_per_tag),
            "unsupported tag width for packed storage: {} bits",
            bits_per_tag
        );
        let dir_bits_per_tag = bits_per_tag - 4;
        let bits_per_bucket = (3 + dir_bits_per_tag) * TAGS_PER_BUCKET;
        let bytes_per_bucket = (bits_per_bucket + 7) >> 3;
        let len = bytes_per_bucket * num_buckets + PADDING_BYTES;
        PackedTable {
            buckets: AlignedBuf::new(len),
            num_buckets,
            bits_per_tag,
            dir_bits_per_tag,
            bits_per_bucket,
            dir_bits_mask: (bits::low_mask(dir_bits_per_tag) as u32) << 4,
            len,
        }
    }

    fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    fn bits_per_tag(&self) -> usize {
        self.bits_per_tag
    }

    fn size_in_bytes(&self) -> usize {
        self.len
    }

    fn find_tag_in_buckets(&self, i1: usize, i2: usize, tag: u32) -> bool {
        if self.bits_per_tag == 13 {
            // Hot path: a 48-bit bucket sits byte-aligned every 6 bytes, so
            // both candidate buckets decode straight out of two word reads.
            let bits1 = bits::read_u64_le(&self.buckets, i1 * 6);
            let bits2 = bits::read_u64_le(&self.buckets, i2 * 6);
            self.decode_bucket_bits(bits1).contains(&tag)
                || self.decode_bucket_bits(bits2).contains(&tag)
        } else {
            self.read_bucket(i1).contains(&tag) || self.read_bucket(i2).contains(&tag)
        }
    }

    fn delete_tag_from_bucket(&mut self, i: usize, tag: u32) -> bool {
        let mut tags = self.read_bucket(i);
        for j in 0..TAGS_PER_BUCKET {
            if tags[j] == tag {
                tags[j] = 0;
                self.write_bucket(i, tags, true);
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
        let mut tags = self.read_bucket(i);
        for j in 0..TAGS_PER_BUCKET {
            if tags[j] == 0 {
                tags[j] = tag;
                self.write_bucket(i, tags, true);
                return Insertion::Stored;
            }
        }
        if kickout {
            let victim_slot = rng.gen_range(0..TAGS_PER_BUCKET);
            let old_tag = tags[victim_slot];
            tags[victim_slot] = tag;
            self.write_bucket(i, tags, true);
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
            "PackedTable with tag size: {} bits ({} direct bits + semi-sorted low nibbles)\n\
             \t\tAssociativity: {}\n\
             \t\tTotal # of rows: {}\n\
             \t\tTotal # of slots: {}",
            self.bits_per_tag,
            self.dir_bits_per_tag,
            TAGS_PER_BUCKET,
            self.num_buckets,
            self.size_in_tags()
        )
    }
}
