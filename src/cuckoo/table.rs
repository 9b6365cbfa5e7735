//! The bucket-storage seam of the cuckoo filter.

use rand_xorshift::XorShiftRng;

/// Outcome of offering a tag to a bucket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Insertion {
    /// The tag landed in a free slot.
    Stored,
    /// The bucket was full; a uniformly random slot was overwritten and its
    /// previous tag is returned for relocation.
    Evicted(u32),
    /// The bucket was full and kicking was not allowed; nothing changed.
    Full,
}

/// Bucket storage for a partial-key cuckoo filter: a power-of-two number of
/// buckets, each holding up to four tags of a fixed bit width. Tag 0 marks
/// an empty slot and is never stored.
pub trait Table {
    /// Creates a zeroed table.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` is not a power of two or if the
    /// implementation does not support `bits_per_tag`.
    fn new(num_buckets: usize, bits_per_tag: usize) -> Self
    where
        Self: Sized;

    /// Returns the number of buckets.
    fn num_buckets(&self) -> usize;

    /// Returns the tag width in bits.
    fn bits_per_tag(&self) -> usize;

    /// Returns the total number of tag slots.
    fn size_in_tags(&self) -> usize {
        4 * self.num_buckets()
    }

    /// Returns the heap size of the bucket array in bytes.
    fn size_in_bytes(&self) -> usize;

    /// Checks whether `tag` occupies a slot of bucket `i1` or bucket `i2`.
    fn find_tag_in_buckets(&self, i1: usize, i2: usize, tag: u32) -> bool;

    /// Clears the first slot of bucket `i` holding `tag`; returns whether a
    /// slot matched.
    fn delete_tag_from_bucket(&mut self, i: usize, tag: u32) -> bool;

    /// Offers `tag` to bucket `i`, evicting a random occupant when the
    /// bucket is full and `kickout` is set.
    fn insert_tag_to_bucket(
        &mut self,
        i: usize,
        tag: u32,
        kickout: bool,
        rng: &mut XorShiftRng,
    ) -> Insertion;

    /// Empties every bucket.
    fn clear(&mut self);

    /// Returns a human-readable summary of the table geometry.
    fn info(&self) -> String;
}
