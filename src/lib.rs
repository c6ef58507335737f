//! chain-table: a single-threaded hash table with separate chaining,
//! insert-if-absent semantics and load-factor driven resizing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a standalone table type per key/value/hash/equality/allocator/
//!   policy combination, fixed at compile time through generics. No type
//!   erasure and no shared runtime dispatch between instantiations.
//! - Layers:
//!   - `KeyOps<K>`: the hash function and equality predicate. `StdOps`
//!     covers `K: Hash + Eq` through any `BuildHasher`, `IdentityOps`
//!     uses integer keys as their own hash, `FnOps` takes closures.
//!   - `LoadPolicy`: four compile-time constants (minimum buckets, aim,
//!     max and min-inverse load factor). `DefaultPolicy` is 32/2/16/16.
//!   - `chain`: the storage layer. A bucket array of chain heads, each
//!     chain a singly linked list of boxed entries allocated from the
//!     table's `allocator_api2` allocator.
//!   - `ChainTable`: find, insert, erase, rehash and clear on top.
//!
//! Constraints
//! - Single-threaded: no locks, no atomics. Mutation takes `&mut self`.
//! - Keys are unique under `KeyOps::eq`; insert never overwrites.
//! - Every entry is reachable from bucket `hash % bucket_count`.
//! - Entries never move in memory; rehash relinks the boxes. A value keeps
//!   its address from insert until its key is erased or the table cleared.
//!
//! Resize policy
//! - All ratios use integer division.
//! - After an insert of a new key, `len / buckets > MAX_LOAD` resizes to
//!   `max(len / AIM_LOAD, MIN_BUCKETS)` buckets.
//! - After an erase that leaves `len > 0`, `buckets / len > MIN_INV_LOAD`
//!   resizes the same way. Erasing the last item does not shrink; the
//!   array is kept until `clear`.
//! - Resizing is best effort. If the allocator refuses the new array the
//!   table stays at its current size and the triggering call still
//!   succeeds.
//!
//! Allocation failures
//! - Only `insert`/`insert_with` can fail, with `InsertError`. Either the
//!   lazily created bucket array or the entry could not be allocated. In
//!   both cases the contents are unchanged; in the second case the array
//!   may have just been created.
//!
//! Notes and non-goals
//! - Order within a bucket is unspecified and changes on rehash.
//! - No open addressing, no persistence, no shrinking below `MIN_BUCKETS`.
//!
//! ```
//! use chain_table::ChainTable;
//!
//! let mut t: ChainTable<&str, u32> = ChainTable::new();
//! assert_eq!(*t.insert("a", 1).unwrap(), 1);
//! assert_eq!(*t.insert("a", 2).unwrap(), 1);
//! assert!(t.erase(&"a"));
//! assert!(t.find(&"a").is_none());
//! ```

mod chain;
pub mod chain_table;
mod chain_table_proptest;
mod error;
pub mod key_ops;
pub mod policy;

// Public surface
pub use allocator_api2::alloc::{AllocError, Allocator, Global};
pub use chain_table::{ChainTable, Iter, IterMut};
pub use error::InsertError;
pub use key_ops::{FnOps, IdentityHasher, IdentityOps, KeyOps, StdOps};
pub use policy::{DefaultPolicy, LoadPolicy, Tuned};
