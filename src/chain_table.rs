//! ChainTable: separately chained hash table with load-factor driven resizing.

use crate::chain::{self, Buckets, Entry, Link, Slot};
use crate::error::InsertError;
use crate::key_ops::{KeyOps, StdOps};
use crate::policy::{self, Checked, DefaultPolicy, LoadPolicy};
use allocator_api2::alloc::{AllocError, Allocator, Global};
use allocator_api2::boxed::Box;
use core::fmt;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use log::{debug, trace};

/// Hash table with separate chaining, insert-if-absent semantics and
/// automatic grow/shrink governed by `P`.
///
/// The bucket array is allocated lazily on the first insert and released
/// only by [`clear`](Self::clear) or drop. Entries are individually boxed
/// in `A`, so a value stays at the same address until its key is erased.
pub struct ChainTable<K, V, O = StdOps, P = DefaultPolicy, A: Allocator = Global> {
    ops: O,
    alloc: A,
    len: usize,
    pub(crate) buckets: Option<Buckets<K, V, A>>,
    _policy: PhantomData<fn() -> P>,
}

impl<K, V> ChainTable<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_ops_in(StdOps::default(), Global)
    }
}

impl<K, V, P, A> ChainTable<K, V, StdOps, P, A>
where
    K: Hash + Eq,
    P: LoadPolicy,
    A: Allocator + Clone,
{
    pub fn new_in(alloc: A) -> Self {
        Self::with_ops_in(StdOps::default(), alloc)
    }
}

impl<K, V, O, P> ChainTable<K, V, O, P, Global>
where
    O: KeyOps<K>,
    P: LoadPolicy,
{
    pub fn with_ops(ops: O) -> Self {
        Self::with_ops_in(ops, Global)
    }
}

impl<K, V, O, P, A> Default for ChainTable<K, V, O, P, A>
where
    O: KeyOps<K> + Default,
    P: LoadPolicy,
    A: Allocator + Clone + Default,
{
    fn default() -> Self {
        Self::with_ops_in(O::default(), A::default())
    }
}

impl<K, V, O, P, A> ChainTable<K, V, O, P, A>
where
    O: KeyOps<K>,
    P: LoadPolicy,
    A: Allocator + Clone,
{
    /// Empty table; allocates nothing.
    pub fn with_ops_in(ops: O, alloc: A) -> Self {
        let () = Checked::<P>::VALID;
        Self {
            ops,
            alloc,
            len: 0,
            buckets: None,
            _policy: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current number of buckets; zero until the first insert.
    pub fn bucket_count(&self) -> usize {
        self.buckets.as_ref().map_or(0, Buckets::len)
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn find(&self, key: &K) -> Option<&V> {
        if self.len == 0 {
            return None;
        }
        let buckets = self.buckets.as_ref()?;
        let idx = buckets.index_of(self.ops.hash(key));
        chain::lookup(buckets.head(idx), key, &self.ops).map(|e| &e.value)
    }

    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.len == 0 {
            return None;
        }
        let buckets = self.buckets.as_mut()?;
        let idx = buckets.index_of(self.ops.hash(key));
        chain::lookup_mut(buckets.head_mut(idx), key, &self.ops).map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Insert `key -> value` unless `key` is already present.
    ///
    /// Returns the stored value: the new one, or the existing one left
    /// untouched when the key was present. Fails only when the allocator
    /// refuses the bucket array or the entry; the contents are then
    /// unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<&mut V, InsertError> {
        self.insert_with(key, move || value)
    }

    /// Like [`insert`](Self::insert), but `make` only runs when the key is
    /// absent.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> Result<&mut V, InsertError>
    where
        F: FnOnce() -> V,
    {
        let hash = self.ops.hash(&key);
        let buckets = Self::buckets_or_init(&mut self.buckets, &self.alloc)?;
        let idx = buckets.index_of(hash);
        if chain::lookup(buckets.head(idx), &key, &self.ops).is_some() {
            return self.settle(hash, key, make);
        }

        let node = Entry::try_boxed(key, make(), self.alloc.clone()).map_err(|e| {
            debug!("insert failed: entry allocation refused ({} items)", self.len);
            InsertError::Entry(e)
        })?;
        if policy::should_grow::<P>(self.len + 1, self.bucket_count()) {
            // Existing entries move first; the new one is linked into the
            // resized array below.
            self.resize(self.len + 1);
        }
        self.link(hash, node)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn erase(&mut self, key: &K) -> bool {
        if self.len == 0 {
            return false;
        }
        let Some(buckets) = self.buckets.as_mut() else {
            return false;
        };
        let idx = buckets.index_of(self.ops.hash(key));
        if chain::unlink(buckets.head_mut(idx), key, &self.ops).is_none() {
            return false;
        }
        self.len -= 1;

        let bucket_count = self.bucket_count();
        if policy::should_shrink::<P>(self.len, bucket_count) {
            trace!(
                "erase left {} items in {} buckets, shrinking",
                self.len,
                bucket_count
            );
            self.resize(self.len);
        }
        true
    }

    /// Resize the bucket array for the aim load factor.
    ///
    /// Best effort: if the allocator refuses the new array, the table keeps
    /// its current array. Does nothing before the first insert.
    pub fn rehash(&mut self) {
        self.resize(self.len);
    }

    /// Drop every entry and the bucket array.
    pub fn clear(&mut self) {
        if let Some(mut buckets) = self.buckets.take() {
            let freed = buckets.release_all();
            debug_assert_eq!(freed, self.len);
            debug!("cleared {} items and {} buckets", freed, buckets.len());
        }
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter {
            heads: self.buckets.as_ref().map(|b| b.heads()).unwrap_or_default(),
            cur: None,
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, A> {
        IterMut {
            heads: self
                .buckets
                .as_mut()
                .map(|b| b.heads_mut())
                .unwrap_or_default(),
            cur: None,
            remaining: self.len,
        }
    }

    fn buckets_or_init<'a>(
        slot: &'a mut Option<Buckets<K, V, A>>,
        alloc: &A,
    ) -> Result<&'a mut Buckets<K, V, A>, InsertError> {
        match slot {
            Some(buckets) => Ok(buckets),
            None => {
                let fresh = Buckets::try_new(P::MIN_BUCKETS, alloc.clone()).map_err(|e| {
                    debug!("insert failed: bucket array allocation refused");
                    InsertError::Buckets(e)
                })?;
                debug!("allocated {} buckets", P::MIN_BUCKETS);
                Ok(slot.insert(fresh))
            }
        }
    }

    /// Value for a key known to be present, inserting it if it is not.
    fn settle<F>(&mut self, hash: u64, key: K, make: F) -> Result<&mut V, InsertError>
    where
        F: FnOnce() -> V,
    {
        let buckets = Self::buckets_or_init(&mut self.buckets, &self.alloc)?;
        let idx = buckets.index_of(hash);
        match chain::find_slot(buckets.head_mut(idx), &key, &self.ops) {
            Slot::Found(entry) => Ok(&mut entry.value),
            Slot::Vacant(link) => {
                let node = Entry::try_boxed(key, make(), self.alloc.clone())
                    .map_err(InsertError::Entry)?;
                self.len += 1;
                Ok(&mut link.insert(node).value)
            }
        }
    }

    /// Append a freshly allocated entry at the tail of its chain.
    fn link(&mut self, hash: u64, node: Box<Entry<K, V, A>, A>) -> Result<&mut V, InsertError> {
        let buckets = Self::buckets_or_init(&mut self.buckets, &self.alloc)?;
        let idx = buckets.index_of(hash);
        match chain::find_slot(buckets.head_mut(idx), &node.key, &self.ops) {
            Slot::Found(entry) => Ok(&mut entry.value),
            Slot::Vacant(link) => {
                self.len += 1;
                Ok(&mut link.insert(node).value)
            }
        }
    }

    /// Move every entry into a new array sized for `items` entries.
    fn resize(&mut self, items: usize) {
        let Some(old) = self.buckets.as_mut() else {
            return;
        };
        let from = old.len();
        let target = policy::target_buckets::<P>(items);
        if target == from {
            trace!("rehash skipped: already at {} buckets", from);
            return;
        }
        let mut fresh = match Buckets::try_new(target, self.alloc.clone()) {
            Ok(fresh) => fresh,
            Err(AllocError) => {
                debug!(
                    "rehash {} -> {} buckets abandoned: allocation refused",
                    from, target
                );
                return;
            }
        };
        old.relink_into(&mut fresh, &self.ops);
        self.buckets = Some(fresh);
        debug!(
            "rehashed {} items: {} -> {} buckets",
            self.len, from, target
        );
    }
}

impl<K, V, O, P, A> fmt::Debug for ChainTable<K, V, O, P, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    O: KeyOps<K>,
    P: LoadPolicy,
    A: Allocator + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, O, P, A> IntoIterator for &'a ChainTable<K, V, O, P, A>
where
    O: KeyOps<K>,
    P: LoadPolicy,
    A: Allocator + Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, O, P, A> IntoIterator for &'a mut ChainTable<K, V, O, P, A>
where
    O: KeyOps<K>,
    P: LoadPolicy,
    A: Allocator + Clone,
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Iterator over `(&K, &V)` in bucket order, then chain order.
pub struct Iter<'a, K, V, A: Allocator> {
    heads: core::slice::Iter<'a, Link<K, V, A>>,
    cur: Option<&'a Entry<K, V, A>>,
    remaining: usize,
}

impl<'a, K, V, A: Allocator> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.cur {
                self.cur = entry.next.as_deref();
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            self.cur = self.heads.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Iter<'_, K, V, A> {}
impl<K, V, A: Allocator> FusedIterator for Iter<'_, K, V, A> {}

/// Iterator over `(&K, &mut V)` in bucket order, then chain order.
pub struct IterMut<'a, K, V, A: Allocator> {
    heads: core::slice::IterMut<'a, Link<K, V, A>>,
    cur: Option<&'a mut Entry<K, V, A>>,
    remaining: usize,
}

impl<'a, K, V, A: Allocator> Iterator for IterMut<'a, K, V, A> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.cur.take() {
                let Entry { key, value, next } = entry;
                self.cur = next.as_deref_mut();
                self.remaining -= 1;
                return Some((&*key, value));
            }
            self.cur = self.heads.next()?.as_deref_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for IterMut<'_, K, V, A> {}
impl<K, V, A: Allocator> FusedIterator for IterMut<'_, K, V, A> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_ops::{FnOps, IdentityOps};
    use crate::policy::Tuned;
    use std::cell::Cell;
    use std::collections::BTreeSet;

    type IdTable = ChainTable<u64, u64, IdentityOps>;
    type SmallTable = ChainTable<u64, u64, IdentityOps, Tuned<4, 1, 2, 4>>;

    /// Invariant: a new table holds nothing and has no bucket array.
    #[test]
    fn new_table_is_unallocated() {
        let t: ChainTable<String, i32> = ChainTable::new();
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert_eq!(t.bucket_count(), 0);
        assert!(t.find(&"x".to_string()).is_none());
        assert_eq!(t.iter().count(), 0);
    }

    /// Invariant: the first insert allocates exactly `MIN_BUCKETS` buckets.
    #[test]
    fn first_insert_allocates_minimum_buckets() {
        let mut t = IdTable::default();
        t.insert(1, 10).unwrap();
        assert_eq!(t.bucket_count(), 32);
        let mut s = SmallTable::default();
        s.insert(1, 10).unwrap();
        assert_eq!(s.bucket_count(), 4);
    }

    /// Invariant: insert never overwrites; it hands back the stored value.
    #[test]
    fn duplicate_insert_returns_existing_value() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        assert_eq!(*t.insert("dup".to_string(), 1).unwrap(), 1);
        assert_eq!(*t.insert("dup".to_string(), 2).unwrap(), 1);
        assert_eq!(t.find(&"dup".to_string()), Some(&1));
        assert_eq!(t.len(), 1);
    }

    /// Invariant: the reference returned by insert aliases the stored value.
    #[test]
    fn insert_reference_writes_through() {
        let mut t: ChainTable<&'static str, Vec<i32>> = ChainTable::new();
        t.insert("k", Vec::new()).unwrap().push(1);
        t.insert("k", Vec::new()).unwrap().push(2);
        assert_eq!(t.find(&"k"), Some(&vec![1, 2]));
        *t.find_mut(&"k").unwrap() = vec![9];
        assert_eq!(t.find(&"k"), Some(&vec![9]));
    }

    /// Invariant: `insert_with` builds the value only for absent keys.
    #[test]
    fn insert_with_is_lazy() {
        let mut t: ChainTable<String, String> = ChainTable::new();
        let calls = Cell::new(0);
        let make = |v: &str| {
            calls.set(calls.get() + 1);
            v.to_string()
        };
        t.insert_with("k".to_string(), || make("v")).unwrap();
        assert_eq!(calls.get(), 1);
        let got = t.insert_with("k".to_string(), || make("v2")).unwrap();
        assert_eq!(got.as_str(), "v");
        assert_eq!(calls.get(), 1, "make must not run for a present key");
    }

    /// Invariant: erase removes exactly the requested key and reports absence.
    #[test]
    fn erase_present_and_absent() {
        let mut t = IdTable::default();
        assert!(!t.erase(&7), "erase on an unallocated table");
        for k in 0..10 {
            t.insert(k, k * 2).unwrap();
        }
        assert!(t.erase(&3));
        assert!(!t.erase(&3));
        assert!(!t.erase(&100));
        assert_eq!(t.len(), 9);
        assert!(t.find(&3).is_none());
        for k in (0..10).filter(|&k| k != 3) {
            assert_eq!(t.find(&k), Some(&(k * 2)));
        }
    }

    /// Invariant: erasing the last item keeps the bucket array; clear drops it.
    #[test]
    fn empty_after_erase_keeps_buckets_until_clear() {
        let mut t = SmallTable::default();
        for k in 0..40 {
            t.insert(k, k).unwrap();
        }
        for k in 0..40 {
            assert!(t.erase(&k));
        }
        assert_eq!(t.len(), 0);
        assert!(t.bucket_count() >= 4);
        assert!(t.find(&0).is_none());

        t.clear();
        assert_eq!(t.bucket_count(), 0);
        t.clear();
        assert_eq!(t.len(), 0);
    }

    /// Invariant: after clear the table is reusable from scratch.
    #[test]
    fn clear_then_reuse() {
        let mut t = IdTable::default();
        for k in 0..100 {
            t.insert(k, k).unwrap();
        }
        t.clear();
        assert_eq!(t.len(), 0);
        assert!((0..100).all(|k| t.find(&k).is_none()));
        t.insert(5, 50).unwrap();
        assert_eq!(t.bucket_count(), 32);
        assert_eq!(t.find(&5), Some(&50));
    }

    /// Invariant: growth fires when `len / buckets` exceeds `MAX_LOAD` and
    /// sizes for `AIM_LOAD`.
    #[test]
    fn grows_past_max_load() {
        let mut t = SmallTable::default();
        // 4 buckets, max load 2: the 12th item makes 12 / 4 = 3 > 2.
        for k in 0..11 {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.bucket_count(), 4);
        t.insert(11, 11).unwrap();
        assert_eq!(t.bucket_count(), 12);
        assert!(t.len() / t.bucket_count() <= 2);
    }

    /// Invariant: shrink fires when `buckets / len` exceeds `MIN_INV_LOAD`,
    /// never below `MIN_BUCKETS`.
    #[test]
    fn shrinks_past_min_inverse_load() {
        let mut t = SmallTable::default();
        for k in 0..100 {
            t.insert(k, k).unwrap();
        }
        let grown = t.bucket_count();
        assert!(grown > 4);
        for k in 0..99 {
            t.erase(&k);
            assert!(t.bucket_count() / t.len() <= 4);
        }
        assert_eq!(t.len(), 1);
        assert_eq!(t.bucket_count(), 4);
        assert_eq!(t.find(&99), Some(&99));
    }

    /// Invariant: rehash changes layout only, never contents.
    #[test]
    fn rehash_preserves_contents() {
        let mut t = SmallTable::default();
        for k in 0..50 {
            t.insert(k, k + 1000).unwrap();
        }
        let before: BTreeSet<(u64, u64)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        t.rehash();
        t.rehash();
        let after: BTreeSet<(u64, u64)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(before, after);
        assert_eq!(t.bucket_count(), 50);
    }

    /// Invariant: rehash before the first insert stays unallocated.
    #[test]
    fn rehash_on_empty_table_is_noop() {
        let mut t = IdTable::default();
        t.rehash();
        assert_eq!(t.bucket_count(), 0);
        assert!(t.is_empty());
    }

    /// Invariant: every entry sits in bucket `hash % bucket_count`.
    #[test]
    fn entries_live_in_their_hash_bucket() {
        let mut t = SmallTable::default();
        for k in 0..200 {
            t.insert(k * 7, k).unwrap();
        }
        for k in (0..200).step_by(3) {
            t.erase(&(k * 7));
        }
        let buckets = t.buckets.as_ref().unwrap();
        let mut seen = 0;
        for (i, head) in buckets.heads().enumerate() {
            let mut cur = head;
            while let Some(node) = cur {
                assert_eq!(node.key as usize % buckets.len(), i);
                seen += 1;
                cur = &node.next;
            }
        }
        assert_eq!(seen, t.len());
    }

    /// Invariant: a value's address survives unrelated inserts, erases and
    /// rehashes.
    #[test]
    fn value_address_is_stable() {
        let mut t = SmallTable::default();
        let addr: *const u64 = t.insert(42, 4242).unwrap();
        for k in 0..500 {
            if k != 42 {
                t.insert(k, k).unwrap();
            }
        }
        t.rehash();
        for k in 0..450 {
            if k != 42 {
                t.erase(&k);
            }
        }
        assert!(core::ptr::eq(t.find(&42).unwrap(), addr));
    }

    /// Invariant: full collisions still resolve by equality.
    #[test]
    fn constant_hash_collisions() {
        let ops = FnOps::new(|_: &String| 0u64, |a: &String, b: &String| a == b);
        let mut t: ChainTable<String, usize, _> = ChainTable::with_ops(ops);
        for i in 0..100 {
            t.insert(format!("k{i}"), i).unwrap();
        }
        assert_eq!(t.len(), 100);
        for i in 0..100 {
            assert_eq!(t.find(&format!("k{i}")), Some(&i));
        }
        assert!(t.erase(&"k50".to_string()));
        assert!(t.find(&"k50".to_string()).is_none());
        assert_eq!(t.find(&"k51".to_string()), Some(&51));
    }

    /// Invariant: iteration yields each live entry once; iter_mut writes through.
    #[test]
    fn iteration_and_mutation() {
        let mut t = IdTable::default();
        for k in 0..64 {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.iter().len(), 64);
        let keys: BTreeSet<u64> = t.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..64).collect());

        for (_, v) in t.iter_mut() {
            *v += 100;
        }
        for (k, v) in &t {
            assert_eq!(*v, *k + 100);
        }
    }

    /// Invariant: Debug renders entries as a map.
    #[test]
    fn debug_renders_map() {
        let mut t = IdTable::default();
        t.insert(1, 2).unwrap();
        assert_eq!(format!("{t:?}"), "{1: 2}");
    }
}
