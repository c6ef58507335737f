#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can inspect
// the bucket layout directly.

use crate::chain_table::ChainTable;
use crate::key_ops::{FnOps, KeyOps, StdOps};
use crate::policy::{LoadPolicy, Tuned};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Erase(usize),
    Find(usize),
    Mutate(usize, i32),
    Rehash,
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
            3 => idx.clone().prop_map(OpI::Erase),
            2 => idx.clone().prop_map(OpI::Find),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Rehash),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Walks every chain and checks count parity and bucket placement.
fn check_layout<O, P>(t: &ChainTable<String, i32, O, P>) -> Result<(), TestCaseError>
where
    O: KeyOps<String>,
    P: LoadPolicy,
{
    let Some(buckets) = t.buckets.as_ref() else {
        prop_assert_eq!(t.len(), 0);
        return Ok(());
    };
    let mut seen = 0;
    for (i, head) in buckets.heads().enumerate() {
        let mut cur = head;
        while let Some(node) = cur {
            prop_assert_eq!(buckets.index_of(t.ops().hash(&node.key)), i);
            seen += 1;
            cur = &node.next;
        }
    }
    prop_assert_eq!(seen, t.len());
    prop_assert!(buckets.len() >= P::MIN_BUCKETS);
    Ok(())
}

fn run_scenario<O, P>(
    mut sut: ChainTable<String, i32, O, P>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    O: KeyOps<String>,
    P: LoadPolicy,
{
    let mut model: HashMap<String, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let expected = *model.entry(k.clone()).or_insert(v);
                let got = *sut.insert(k, v).expect("global allocator");
                prop_assert_eq!(got, expected, "insert must return the stored value");
            }
            OpI::InsertWith(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                let mut ran = false;
                let got = *sut
                    .insert_with(k.clone(), || {
                        ran = true;
                        v
                    })
                    .expect("global allocator");
                prop_assert_eq!(ran, !already, "make runs only for absent keys");
                prop_assert_eq!(got, *model.entry(k).or_insert(v));
            }
            OpI::Erase(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.erase(k), model.remove(k).is_some());
                prop_assert!(sut.find(k).is_none());
            }
            OpI::Find(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.find(k), model.get(k));
                prop_assert_eq!(sut.contains_key(k), model.contains_key(k));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                match (sut.find_mut(k), model.get_mut(k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.wrapping_add(d);
                        *mv = mv.wrapping_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "find_mut parity: {:?} vs {:?}", s, m),
                }
            }
            OpI::Rehash => {
                let before: BTreeSet<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                sut.rehash();
                let after: BTreeSet<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(before, after);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.bucket_count(), 0);
            }
            OpI::Iterate => {
                let s: BTreeSet<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m: BTreeSet<(String, i32)> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s, m);
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        if sut.bucket_count() > 0 {
            prop_assert!(sut.len() / sut.bucket_count() <= P::MAX_LOAD);
        }
        check_layout(&sut)?;
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Insert never overwrites and always returns the stored value.
// - `insert_with` runs its constructor exactly when the key is absent.
// - `erase`/`find`/`find_mut` parity with the model.
// - `rehash` preserves contents; `clear` drops the bucket array.
// - Every entry sits in bucket `hash % bucket_count`; entry count equals `len`.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: ChainTable<String, i32> = ChainTable::new();
        run_scenario(sut, pool, ops)?;
    }
}

// Property: same invariants with a tiny policy so grow and shrink fire
// constantly on small pools.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_small_policy((pool, ops) in arb_scenario()) {
        let sut: ChainTable<String, i32, StdOps, Tuned<1, 1, 1, 2>> =
            ChainTable::with_ops(StdOps::default());
        run_scenario(sut, pool, ops)?;
    }
}

// Property: same invariants under worst-case collisions (constant hash),
// stressing equality resolution within a single chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let collide = FnOps::new(
            (|_: &String| 0) as fn(&String) -> u64,
            (|a: &String, b: &String| a == b) as fn(&String, &String) -> bool,
        );
        let sut: ChainTable<String, i32, _, Tuned<2, 1, 2, 2>> = ChainTable::with_ops(collide);
        run_scenario(sut, pool, ops)?;
    }
}
