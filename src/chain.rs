//! Storage layer: bucket array of chain heads and the boxed chain entries.
//!
//! Every entry is a separate allocation from the table's allocator and is
//! owned by the link that points at it (bucket head or predecessor). Moving
//! an entry between chains moves the box, never the entry, so a value's
//! address is fixed from insert until erase.

use crate::key_ops::KeyOps;
use allocator_api2::alloc::{AllocError, Allocator};
use allocator_api2::boxed::Box;
use allocator_api2::vec::Vec;

pub(crate) type Link<K, V, A> = Option<Box<Entry<K, V, A>, A>>;

pub(crate) struct Entry<K, V, A: Allocator> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Link<K, V, A>,
}

impl<K, V, A: Allocator> Entry<K, V, A> {
    pub(crate) fn try_boxed(key: K, value: V, alloc: A) -> Result<Box<Self, A>, AllocError> {
        Box::try_new_in(
            Entry {
                key,
                value,
                next: None,
            },
            alloc,
        )
    }
}

/// Fixed-size array of chain heads.
pub(crate) struct Buckets<K, V, A: Allocator> {
    heads: Vec<Link<K, V, A>, A>,
}

impl<K, V, A: Allocator> Buckets<K, V, A> {
    /// Allocate `count` empty buckets, or fail without side effects.
    pub(crate) fn try_new(count: usize, alloc: A) -> Result<Self, AllocError> {
        let mut heads = Vec::new_in(alloc);
        heads.try_reserve_exact(count).map_err(|_| AllocError)?;
        for _ in 0..count {
            heads.push(None);
        }
        Ok(Self { heads })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u64) -> usize {
        (hash % self.heads.len() as u64) as usize
    }

    #[inline]
    pub(crate) fn head(&self, idx: usize) -> &Link<K, V, A> {
        &self.heads[idx]
    }

    #[inline]
    pub(crate) fn head_mut(&mut self, idx: usize) -> &mut Link<K, V, A> {
        &mut self.heads[idx]
    }

    pub(crate) fn heads(&self) -> core::slice::Iter<'_, Link<K, V, A>> {
        self.heads.iter()
    }

    pub(crate) fn heads_mut(&mut self) -> core::slice::IterMut<'_, Link<K, V, A>> {
        self.heads.iter_mut()
    }

    /// Move every entry of `self` to the head of its chain in `dest`.
    /// Leaves `self` with only empty buckets.
    pub(crate) fn relink_into<O>(&mut self, dest: &mut Buckets<K, V, A>, ops: &O)
    where
        O: KeyOps<K>,
    {
        for head in self.heads.iter_mut() {
            let mut cur = head.take();
            while let Some(mut node) = cur {
                cur = node.next.take();
                let slot = dest.head_mut(dest.index_of(ops.hash(&node.key)));
                node.next = slot.take();
                *slot = Some(node);
            }
        }
    }

    /// Free every entry, walking each chain iteratively. Returns the number
    /// of entries released.
    pub(crate) fn release_all(&mut self) -> usize {
        let mut freed = 0;
        for head in self.heads.iter_mut() {
            let mut cur = head.take();
            while let Some(mut node) = cur {
                cur = node.next.take();
                drop(node);
                freed += 1;
            }
        }
        freed
    }
}

impl<K, V, A: Allocator> Drop for Buckets<K, V, A> {
    fn drop(&mut self) {
        // Boxed chains would otherwise drop recursively.
        self.release_all();
    }
}

/// First entry in the chain starting at `link` whose key matches.
pub(crate) fn lookup<'a, K, V, A, O>(
    mut link: &'a Link<K, V, A>,
    key: &K,
    ops: &O,
) -> Option<&'a Entry<K, V, A>>
where
    A: Allocator,
    O: KeyOps<K>,
{
    while let Some(node) = link {
        if ops.eq(&node.key, key) {
            return Some(&**node);
        }
        link = &node.next;
    }
    None
}

pub(crate) fn lookup_mut<'a, K, V, A, O>(
    mut link: &'a mut Link<K, V, A>,
    key: &K,
    ops: &O,
) -> Option<&'a mut Entry<K, V, A>>
where
    A: Allocator,
    O: KeyOps<K>,
{
    while let Some(node) = link {
        if ops.eq(&node.key, key) {
            return Some(&mut **node);
        }
        link = &mut node.next;
    }
    None
}

/// Where a key lives in a chain: its entry, or the empty tail link a new
/// entry for it would be appended to.
pub(crate) enum Slot<'a, K, V, A: Allocator> {
    Found(&'a mut Entry<K, V, A>),
    Vacant(&'a mut Link<K, V, A>),
}

pub(crate) fn find_slot<'a, K, V, A, O>(
    mut link: &'a mut Link<K, V, A>,
    key: &K,
    ops: &O,
) -> Slot<'a, K, V, A>
where
    A: Allocator,
    O: KeyOps<K>,
{
    while let Some(node) = link {
        if ops.eq(&node.key, key) {
            return Slot::Found(&mut **node);
        }
        link = &mut node.next;
    }
    Slot::Vacant(link)
}

/// Detach and return the first entry whose key matches, splicing its
/// successor into its place.
pub(crate) fn unlink<K, V, A, O>(
    mut link: &mut Link<K, V, A>,
    key: &K,
    ops: &O,
) -> Link<K, V, A>
where
    A: Allocator,
    O: KeyOps<K>,
{
    loop {
        match link {
            None => return None,
            Some(node) if ops.eq(&node.key, key) => {
                let next = node.next.take();
                return core::mem::replace(link, next);
            }
            Some(node) => link = &mut node.next,
        }
    }
}
