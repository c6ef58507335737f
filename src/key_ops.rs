//! Hash and equality contract binding a key type to a table.

use core::fmt;
use core::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use hashbrown::hash_map::DefaultHashBuilder;

/// Hash function plus equality predicate for keys of type `K`.
///
/// Implementations must be consistent: `eq(a, b)` implies
/// `hash(a) == hash(b)`.
pub trait KeyOps<K: ?Sized> {
    fn hash(&self, key: &K) -> u64;
    fn eq(&self, a: &K, b: &K) -> bool;
}

/// `K: Hash + Eq` keys hashed through a `BuildHasher`.
#[derive(Clone, Default)]
pub struct StdOps<S = DefaultHashBuilder> {
    hasher: S,
}

impl<S> StdOps<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }
}

impl<S> fmt::Debug for StdOps<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdOps").finish_non_exhaustive()
    }
}

impl<K, S> KeyOps<K> for StdOps<S>
where
    K: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// Hasher that passes a single integer key through unchanged. Meant for
/// keys that already are unique integer ids (`u16` and wider); byte input
/// is folded in FNV-1a style.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityHasher {
    state: u64,
}

impl IdentityHasher {
    #[inline]
    fn mix(&mut self, n: u64) {
        self.state = self.state.rotate_left(5) ^ n;
    }
}

impl Hasher for IdentityHasher {
    fn write(&mut self, bytes: &[u8]) {
        let mut h = self.state ^ 0xcbf2_9ce4_8422_2325;
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        self.state = h;
    }

    #[inline]
    fn write_u16(&mut self, n: u16) {
        self.mix(u64::from(n));
    }
    #[inline]
    fn write_u32(&mut self, n: u32) {
        self.mix(u64::from(n));
    }
    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.mix(n);
    }
    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.mix(n as u64);
    }
    #[inline]
    fn write_i32(&mut self, n: i32) {
        self.mix(u64::from(n as u32));
    }
    #[inline]
    fn write_i64(&mut self, n: i64) {
        self.mix(n as u64);
    }
    #[inline]
    fn write_isize(&mut self, n: isize) {
        self.mix(n as u64);
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// Integer keys used directly as their own hash.
pub type IdentityOps = StdOps<BuildHasherDefault<IdentityHasher>>;

/// Hash and equality supplied as closures or function pointers.
///
/// ```
/// use chain_table::{ChainTable, FnOps};
///
/// // Case-insensitive ASCII keys.
/// let ops = FnOps::new(
///     |k: &String| k.bytes().fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b.to_ascii_lowercase()))),
///     |a: &String, b: &String| a.eq_ignore_ascii_case(b),
/// );
/// let mut t: ChainTable<String, i32, _> = ChainTable::with_ops(ops);
/// t.insert("Key".to_string(), 1).unwrap();
/// assert_eq!(t.find(&"KEY".to_string()), Some(&1));
/// ```
#[derive(Clone, Copy)]
pub struct FnOps<H, E> {
    hash: H,
    eq: E,
}

impl<H, E> FnOps<H, E> {
    pub fn new(hash: H, eq: E) -> Self {
        Self { hash, eq }
    }
}

impl<H, E> fmt::Debug for FnOps<H, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOps").finish_non_exhaustive()
    }
}

impl<K, H, E> KeyOps<K> for FnOps<H, E>
where
    K: ?Sized,
    H: Fn(&K) -> u64,
    E: Fn(&K, &K) -> bool,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        (self.hash)(key)
    }

    #[inline]
    fn eq(&self, a: &K, b: &K) -> bool {
        (self.eq)(a, b)
    }
}
