//! # amq-filters
//!
//! `amq-filters` contains a family of approximate set-membership filters:
//! compact probabilistic data structures that answer "is `x` a member of set
//! `S`?" with no false negatives and a bounded false-positive rate, using far
//! less memory than the keys themselves.
//!
//! Three engines share one surface:
//!
//!  - [`cuckoo::CuckooFilter`] — a partial-key cuckoo hash table over short
//!    fingerprints, supporting deletion, with a choice of bucket storage:
//!    plain bit-packed buckets ([`cuckoo::SingleTable`]) or semi-sorted
//!    buckets that save one bit per slot ([`cuckoo::PackedTable`]).
//!  - [`simd_block::SimdBlockFilter`] — a split block Bloom filter with one
//!    bit set per 32-bit lane of a cache-line-sized block, optimized for
//!    lookups.
//!  - [`shingle::Shingle`] — a cuckoo variant with overlapping buckets that
//!    reaches higher load factors at the cost of a longer local search.
//!
//! ## Usage
//!
//! ```
//! use amq_filters::cuckoo::{CuckooFilter, SingleTable};
//! use amq_filters::{Filter, Status};
//!
//! let mut filter = CuckooFilter::<SingleTable>::new(1000);
//!
//! assert_eq!(filter.insert(42), Status::Ok);
//! assert!(filter.contains(42));
//!
//! assert_eq!(filter.remove(42), Status::Ok);
//! assert!(!filter.contains(42));
//! ```
//!
//! ## References
//!
//!  - [Cuckoo Filter: Practically Better Than Bloom](https://dl.acm.org/citation.cfm?id=2674994)
//!  > Fan, Bin, Dave G. Andersen, Michael Kaminsky, and Michael D. Mitzenmacher. 2014. “Cuckoo Filter: Practically Better Than Bloom.” In *Proceedings of the 10th ACM International on Conference on Emerging Networking Experiments and Technologies*, 75–88. CoNEXT ’14. New York, NY, USA: ACM. doi:[10.1145/2674005.2674994](https://doi.org/10.1145/2674005.2674994).
//!  - [Cache-, Hash- and Space-Efficient Bloom Filters](https://doi.org/10.1007/978-3-540-72845-0_9)
//!  > Putze, Felix, Peter Sanders, and Johannes Singler. 2007. “Cache-, Hash- and Space-Efficient Bloom Filters.” In *Experimental Algorithms*, 108–21. WEA ’07. Berlin, Heidelberg: Springer.
//!  - [3.5-Way Cuckoo Hashing for the Price of 2-and-a-Bit](https://doi.org/10.1007/978-3-642-04128-0_60)
//!  > Lehman, Eric, and Rina Panigrahy. 2009. “3.5-Way Cuckoo Hashing for the Price of 2-and-a-Bit.” In *Algorithms - ESA 2009*, 671–81. Berlin, Heidelberg: Springer.
//!  - [Universal Hashing and k-Wise Independent Random Variables via Integer Arithmetic without Primes](https://doi.org/10.1007/3-540-60922-9_46)
//!  > Dietzfelbinger, Martin. 1996. “Universal Hashing and k-Wise Independent Random Variables via Integer Arithmetic without Primes.” In *STACS 96*, 569–80. Berlin, Heidelberg: Springer.
//!  - [The Power of Simple Tabulation Hashing](https://doi.org/10.1145/2220357.2220361)
//!  > Pătraşcu, Mihai, and Mikkel Thorup. 2012. “The Power of Simple Tabulation Hashing.” *J. ACM* 59 (3).

#![warn(missing_docs)]

pub mod aligned;
mod bits;
pub mod cuckoo;
pub mod hashing;
pub mod shingle;
pub mod simd_block;

pub use crate::hashing::{HashFamily, SimpleTabulation, TwoIndependentMultiplyShift};

/// Outcome of a filter operation.
///
/// The set is closed: every operation on every filter in this crate reports
/// one of these four codes. Programming errors (zero capacity, unsupported
/// tag widths) are not statuses; they panic at construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Status {
    /// The operation succeeded.
    Ok = 0,
    /// The key was not present.
    NotFound = 1,
    /// The filter cannot accept another key.
    NotEnoughSpace = 2,
    /// The filter does not implement this operation.
    NotSupported = 3,
}

/// The uniform surface shared by every filter in this crate.
///
/// All filters store 64-bit keys. A filter never reports a false negative:
/// after `insert(k)` returns [`Status::Ok`] and before any `remove(k)`,
/// `contains(k)` is `true`. `contains` may report a false positive with a
/// small, filter-specific probability.
///
/// # Examples
///
/// ```
/// use amq_filters::cuckoo::{CuckooFilter, SingleTable};
/// use amq_filters::shingle::Shingle;
/// use amq_filters::simd_block::SimdBlockFilter;
/// use amq_filters::{Filter, Status};
///
/// let mut filters: Vec<Box<dyn Filter>> = vec![
///     Box::new(CuckooFilter::<SingleTable>::new(1000)),
///     Box::new(SimdBlockFilter::new(10)),
///     Box::new(Shingle::new(10)),
/// ];
///
/// for filter in &mut filters {
///     assert_eq!(filter.insert(7), Status::Ok);
///     assert!(filter.contains(7));
/// }
/// ```
pub trait Filter {
    /// Inserts a key, returning [`Status::NotEnoughSpace`] when the filter
    /// is full.
    fn insert(&mut self, key: u64) -> Status;

    /// Checks whether a key is possibly a member.
    fn contains(&self, key: u64) -> bool;

    /// Removes a key, returning [`Status::NotFound`] when it is absent and
    /// [`Status::NotSupported`] when the filter cannot delete.
    fn remove(&mut self, key: u64) -> Status;

    /// Returns the number of keys currently stored.
    fn len(&self) -> usize;

    /// Returns `true` if no keys are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the heap size of the filter's storage in bytes.
    fn size_in_bytes(&self) -> usize;

    /// Returns a human-readable summary of the filter. The exact format is
    /// for diagnostics only and is not part of any stability contract.
    fn info(&self) -> String;
}
