//! Resize policy: compile-time load-factor constants and the decisions
//! derived from them.
//!
//! All ratios use integer division, so `MAX_LOAD = 16` means "grow once
//! `len / buckets` reaches 17".

/// Tuning constants for a `ChainTable`. Every constant must be non-zero.
pub trait LoadPolicy {
    /// Minimum and initial number of buckets.
    const MIN_BUCKETS: usize;
    /// Items per bucket that `rehash` sizes the table for.
    const AIM_LOAD: usize;
    /// Grow after an insert once `len / buckets` exceeds this.
    const MAX_LOAD: usize;
    /// Shrink after an erase once `buckets / len` exceeds this.
    const MIN_INV_LOAD: usize;
}

/// Defaults for callers that do not need precise tuning: 32 buckets,
/// aim load 2, max load 16, min-inverse load 16.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultPolicy;

impl LoadPolicy for DefaultPolicy {
    const MIN_BUCKETS: usize = 32;
    const AIM_LOAD: usize = 2;
    const MAX_LOAD: usize = 16;
    const MIN_INV_LOAD: usize = 16;
}

/// Explicitly tuned policy, e.g. `Tuned<8, 1, 4, 8>`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Tuned<
    const MIN_BUCKETS: usize,
    const AIM_LOAD: usize,
    const MAX_LOAD: usize,
    const MIN_INV_LOAD: usize,
>;

impl<const MIN_BUCKETS: usize, const AIM_LOAD: usize, const MAX_LOAD: usize, const MIN_INV_LOAD: usize>
    LoadPolicy for Tuned<MIN_BUCKETS, AIM_LOAD, MAX_LOAD, MIN_INV_LOAD>
{
    const MIN_BUCKETS: usize = MIN_BUCKETS;
    const AIM_LOAD: usize = AIM_LOAD;
    const MAX_LOAD: usize = MAX_LOAD;
    const MIN_INV_LOAD: usize = MIN_INV_LOAD;
}

/// Post-monomorphization check; referenced from the table constructors so
/// a zero constant fails the build of that instantiation.
pub(crate) struct Checked<P>(core::marker::PhantomData<P>);

impl<P: LoadPolicy> Checked<P> {
    pub(crate) const VALID: () = assert!(
        P::MIN_BUCKETS > 0 && P::AIM_LOAD > 0 && P::MAX_LOAD > 0 && P::MIN_INV_LOAD > 0,
        "LoadPolicy constants must be non-zero"
    );
}

/// Bucket count `rehash` aims for with `items` live entries.
#[inline]
pub(crate) fn target_buckets<P: LoadPolicy>(items: usize) -> usize {
    (items / P::AIM_LOAD).max(P::MIN_BUCKETS)
}

/// Whether an insert that left `items` entries in `buckets` buckets
/// should trigger a grow.
#[inline]
pub(crate) fn should_grow<P: LoadPolicy>(items: usize, buckets: usize) -> bool {
    buckets > 0 && items / buckets > P::MAX_LOAD
}

/// Whether an erase that left `items` entries in `buckets` buckets should
/// trigger a shrink. Never fires at zero items.
#[inline]
pub(crate) fn should_shrink<P: LoadPolicy>(items: usize, buckets: usize) -> bool {
    items > 0 && buckets / items > P::MIN_INV_LOAD
}
