use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Check every tree invariant we can observe from outside: strictly
/// ascending in-order keys, exact agreement with the reference model, and a
/// consistent O(n) count.
fn validate_id_map(map: &IdMap<u32>, model: &BTreeMap<u64, (u32, u64)>) {
    let snapshot = map.snapshot_keys();
    assert!(
        snapshot.windows(2).all(|w| w[0].0 < w[1].0),
        "in-order keys must be strictly ascending"
    );
    let expected: Vec<(u64, u64)> = model.iter().map(|(&id, &(_, rc))| (id, rc)).collect();
    assert_eq!(snapshot, expected, "live entries must match the model");
    assert_eq!(map.count(), model.len());
}

fn validate_range_map(map: &RangeMap<u32>, model: &BTreeMap<usize, (usize, u32)>) {
    let snapshot = map.snapshot_ranges();
    assert!(
        snapshot.windows(2).all(|w| w[0].0 < w[1].0),
        "in-order starts must be strictly ascending"
    );
    let expected: Vec<(usize, usize)> = model.iter().map(|(&s, &(len, _))| (s, len)).collect();
    assert_eq!(snapshot, expected, "live ranges must match the model");
    assert_eq!(map.count(), model.len());
}

#[derive(Clone, Debug)]
enum IdOp {
    Insert(u64, u32),
    Refcount(u64, i64),
    Lookup(u64),
}

fn id_ops() -> impl Strategy<Value = Vec<IdOp>> {
    // A small identifier space forces plenty of hits, duplicate-insert
    // attempts, and delete/reinsert churn.
    let id = 0u64..48;
    let op = prop_oneof![
        3 => (id.clone(), any::<u32>()).prop_map(|(id, m)| IdOp::Insert(id, m)),
        4 => (id.clone(), prop_oneof![Just(1i64), Just(-1), Just(2)])
            .prop_map(|(id, d)| IdOp::Refcount(id, d)),
        2 => id.prop_map(IdOp::Lookup),
    ];
    prop::collection::vec(op, 0..=400)
}

#[derive(Clone, Debug)]
enum RangeOp {
    Insert(usize, usize, u32),
    Remove(usize),
    Lookup(usize),
}

/// Ranges are laid out in fixed 0x100-wide slots so generated ranges are
/// always disjoint, matching the allocator's guarantee for live blocks.
fn range_ops() -> impl Strategy<Value = Vec<RangeOp>> {
    let slot = 0usize..24;
    let op = prop_oneof![
        3 => (slot.clone(), 1usize..=0x100, any::<u32>())
            .prop_map(|(s, len, m)| RangeOp::Insert(0x1000 + s * 0x100, len, m)),
        2 => slot.clone().prop_map(|s| RangeOp::Remove(0x1000 + s * 0x100)),
        3 => (slot, 0usize..0x180).prop_map(|(s, off)| RangeOp::Lookup(0x1000 + s * 0x100 + off)),
    ];
    prop::collection::vec(op, 0..=400)
}

proptest! {
    /// Replay arbitrary op sequences against a BTreeMap reference holding
    /// `id -> (meta, refcount)`. The model applies the exact lifecycle
    /// rules: refcounts wrap like the map's, and an entry landing on zero
    /// is removed.
    #[test]
    fn id_map_matches_reference(ops in id_ops()) {
        let map: IdMap<u32> = IdMap::new();
        let mut model: BTreeMap<u64, (u32, u64)> = BTreeMap::new();

        for op in ops {
            match op {
                IdOp::Insert(id, meta) => {
                    let result = map.try_insert(id, meta);
                    if model.contains_key(&id) {
                        prop_assert_eq!(result, Err(Violation::DuplicateId { id }));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        model.insert(id, (meta, 0));
                    }
                }
                IdOp::Refcount(id, delta) => {
                    let found = map.update_refcount(id, delta);
                    prop_assert_eq!(found, model.contains_key(&id));
                    if let Some((_, rc)) = model.get_mut(&id) {
                        *rc = rc.wrapping_add_signed(delta);
                        if *rc == 0 {
                            model.remove(&id);
                        }
                    }
                }
                IdOp::Lookup(id) => {
                    let hit = map.lookup(id);
                    match model.get(&id) {
                        Some(&(meta, rc)) => {
                            let entry = hit.expect("model says present");
                            prop_assert_eq!(entry.id, id);
                            prop_assert_eq!(entry.meta, meta);
                            prop_assert_eq!(entry.refcount, rc);
                        }
                        None => prop_assert!(hit.is_none()),
                    }
                }
            }
            validate_id_map(&map, &model);
        }
    }

    /// Replay arbitrary disjoint-range op sequences against a BTreeMap
    /// reference holding `start -> (len, meta)`; containment lookups are
    /// answered by the model with a predecessor scan.
    #[test]
    fn range_map_matches_reference(ops in range_ops()) {
        let map: RangeMap<u32> = RangeMap::new();
        let mut model: BTreeMap<usize, (usize, u32)> = BTreeMap::new();

        for op in ops {
            match op {
                RangeOp::Insert(start, len, meta) => {
                    let result = map.try_insert(start, len, meta);
                    if model.contains_key(&start) {
                        prop_assert_eq!(result, Err(Violation::DuplicateRange { start }));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        model.insert(start, (len, meta));
                    }
                }
                RangeOp::Remove(start) => {
                    let removed = map.remove(start);
                    match model.remove(&start) {
                        Some((len, meta)) => {
                            let hit = removed.expect("model says present");
                            prop_assert_eq!(hit.start, start);
                            prop_assert_eq!(hit.end, start + len);
                            prop_assert_eq!(hit.meta, meta);
                        }
                        None => prop_assert!(removed.is_none()),
                    }
                }
                RangeOp::Lookup(addr) => {
                    let hit = map.lookup(addr);
                    let expected = model
                        .range(..=addr)
                        .next_back()
                        .filter(|(&start, &(len, _))| addr - start < len);
                    match expected {
                        Some((&start, &(len, meta))) => {
                            let hit = hit.expect("model says covered");
                            prop_assert_eq!(hit.start, start);
                            prop_assert_eq!(hit.end, start + len);
                            prop_assert_eq!(hit.meta, meta);
                        }
                        None => prop_assert!(hit.is_none()),
                    }
                }
            }
            validate_range_map(&map, &model);
        }
    }
}
