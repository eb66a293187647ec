//! Property/fuzz-style invariants for dock tree operations.
//!
//! Random operation streams run against the public mutator API, each
//! accepted step followed by the validator pass the manager applies. After
//! every step the suite checks key uniqueness, ratio bounds, the document
//! floor, atomic rejection, and snapshot stability.

use std::collections::BTreeSet;

use dockwork_layout::{
    ContentKind, DockOperation, DockPosition, DockRequest, DockSide, DockTree, MAX_SPLIT_RATIO,
    MIN_SPLIT_RATIO, MutationRejected, NodeId, PersistKey, PopupSize, apply_operation, from_dto,
    invariant_report, pin_to_auto_hide, to_dto, validate_and_fix,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn choose_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.next_u64() % len as u64) as usize
    }

    fn choose_bool(&mut self) -> bool {
        (self.next_u64() & 1) == 0
    }

    fn next_ratio(&mut self) -> f64 {
        // Deliberately spans past both clamp bounds.
        (self.next_u64() % 1_200) as f64 / 1_000.0 - 0.1
    }
}

const KEY_POOL: [&str; 10] = [
    "Doc:0", "Doc:1", "Doc:2", "Doc:3", "Doc:4", "Tool:0", "Tool:1", "Tool:2", "Tool:3", "Tool:4",
];

fn key(raw: &str) -> PersistKey {
    PersistKey::new(raw).expect("pool keys are non-blank")
}

fn kind_of(key: &PersistKey) -> ContentKind {
    if key.as_str().starts_with("Tool:") {
        ContentKind::ToolWindow
    } else {
        ContentKind::Document
    }
}

fn random_side(rng: &mut Lcg) -> DockSide {
    DockSide::ALL[rng.choose_index(DockSide::ALL.len())]
}

fn group_ids(tree: &DockTree) -> Vec<(NodeId, ContentKind)> {
    tree.groups()
        .map(|(id, group)| (id.clone(), group.content_kind()))
        .collect()
}

fn docked_keys(tree: &DockTree) -> Vec<PersistKey> {
    tree.groups()
        .flat_map(|(_, group)| group.items().iter().map(|item| item.persist_key.clone()))
        .collect()
}

fn pinned_keys(tree: &DockTree) -> Vec<PersistKey> {
    tree.auto_hides()
        .flat_map(|(_, strip)| strip.items().iter().map(|item| item.persist_key.clone()))
        .collect()
}

fn split_ids(tree: &DockTree) -> Vec<NodeId> {
    tree.walk()
        .filter(|record| record.node().as_split().is_some())
        .map(|record| record.id().clone())
        .collect()
}

fn random_operation(tree: &DockTree, rng: &mut Lcg) -> DockOperation {
    let groups = group_ids(tree);
    let docked = docked_keys(tree);
    let pinned = pinned_keys(tree);
    let splits = split_ids(tree);

    let mut candidates = vec![0usize, 5]; // DockToGroup, EnsureToolArea
    if !docked.is_empty() {
        candidates.push(1); // PinToAutoHide
        candidates.push(6); // SetGroupActive
    }
    if !pinned.is_empty() {
        candidates.push(2); // UnpinFromAutoHide
    }
    if !docked.is_empty() || !pinned.is_empty() {
        candidates.push(3); // CloseContent
    }
    if !splits.is_empty() {
        candidates.push(4); // SetSplitRatio
    }

    match candidates[rng.choose_index(candidates.len())] {
        1 => DockOperation::PinToAutoHide {
            key: docked[rng.choose_index(docked.len())].clone(),
            side: random_side(rng),
            popup_size: rng
                .choose_bool()
                .then(|| PopupSize::new(320.0, 240.0)),
        },
        2 => {
            let target_group = rng
                .choose_bool()
                .then(|| groups[rng.choose_index(groups.len())].0.clone());
            let key = pinned[rng.choose_index(pinned.len())].clone();
            DockOperation::UnpinFromAutoHide {
                kind: Some(kind_of(&key)),
                key,
                target_group,
                make_active: rng.choose_bool(),
            }
        }
        3 => {
            let mut all: Vec<PersistKey> = docked.iter().chain(pinned.iter()).cloned().collect();
            all.sort();
            DockOperation::CloseContent {
                key: all[rng.choose_index(all.len())].clone(),
            }
        }
        4 => DockOperation::SetSplitRatio {
            split: splits[rng.choose_index(splits.len())].clone(),
            ratio: rng.next_ratio(),
        },
        5 => DockOperation::EnsureToolArea {
            placement: random_side(rng),
            ratio: rng.choose_bool().then(|| rng.next_ratio()),
        },
        6 => DockOperation::SetGroupActive {
            key: docked[rng.choose_index(docked.len())].clone(),
        },
        _ => {
            let incoming = key(KEY_POOL[rng.choose_index(KEY_POOL.len())]);
            let incoming_kind = kind_of(&incoming);
            let (target, target_kind) = groups[rng.choose_index(groups.len())].clone();
            let position = if target_kind == incoming_kind && rng.choose_bool() {
                DockPosition::Center
            } else {
                DockPosition::from(random_side(rng))
            };
            let ratio = rng.choose_bool().then(|| rng.next_ratio());
            DockOperation::DockToGroup(
                DockRequest::new(incoming, target)
                    .position(position)
                    .ratio(ratio)
                    .make_active(rng.choose_bool())
                    .new_group_kind(Some(incoming_kind)),
            )
        }
    }
}

fn assert_keys_unique(tree: &DockTree) {
    let keys = tree.all_keys();
    let unique: BTreeSet<&PersistKey> = keys.iter().collect();
    assert_eq!(keys.len(), unique.len(), "duplicate persist keys: {keys:?}");
}

fn assert_tree_invariants(tree: &DockTree) {
    assert_keys_unique(tree);
    assert!(
        tree.document_group_count() >= 1,
        "at least one document group must remain"
    );
    for (id, group) in tree.groups() {
        for item in group.items() {
            assert_eq!(
                kind_of(&item.persist_key),
                group.content_kind(),
                "group {id} holds {} of another kind",
                item.persist_key
            );
        }
    }
    for (id, strip) in tree.auto_hides() {
        for item in strip.items() {
            assert_eq!(
                kind_of(&item.persist_key),
                strip.content_kind(),
                "strip {id} holds {} of another kind",
                item.persist_key
            );
        }
    }
    for record in tree.walk() {
        if let Some(split) = record.node().as_split() {
            assert!(
                (MIN_SPLIT_RATIO..=MAX_SPLIT_RATIO).contains(&split.ratio()),
                "split {} ratio {} out of bounds",
                record.id(),
                split.ratio()
            );
        }
    }
    let report = invariant_report(tree);
    assert!(
        !report.has_errors(),
        "invariant report contains errors: {:?}",
        report.issues
    );
}

fn run_sequence(seed: u64, steps: usize) -> (DockTree, Vec<DockOperation>) {
    let mut tree = DockTree::with_document_group();
    let mut rng = Lcg::new(seed);
    let mut applied = Vec::with_capacity(steps);

    for step in 0..steps {
        let operation = random_operation(&tree, &mut rng);
        let before = tree.clone();
        match apply_operation(&mut tree, &operation) {
            Ok(_) => {
                assert_keys_unique(&tree);
                tree = validate_and_fix(&tree, true);
                assert_tree_invariants(&tree);
                applied.push(operation);
            }
            Err(reason) => {
                assert_eq!(
                    tree, before,
                    "rejected operation must leave the tree unchanged \
                     (step {step}, seed={seed}, op={operation:?}, reason={reason})"
                );
            }
        }
    }

    (tree, applied)
}

fn replay(operations: &[DockOperation]) -> DockTree {
    let mut tree = DockTree::with_document_group();
    for operation in operations {
        apply_operation(&mut tree, operation).expect("replayed operation should succeed");
        tree = validate_and_fix(&tree, true);
    }
    tree
}

fn assert_snapshot_stable(tree: &DockTree) {
    let first = to_dto(tree);
    let restored = from_dto(&first, None)
        .expect("latest version restores")
        .expect("root present");
    let second = to_dto(&restored);
    let again = from_dto(&second, None)
        .expect("latest version restores")
        .expect("root present");
    assert_eq!(to_dto(&again), second, "restore must be idempotent");

    let document_pins = tree
        .auto_hides()
        .any(|(_, strip)| strip.content_kind() == ContentKind::Document && !strip.is_empty());
    if !document_pins {
        assert_eq!(second, first, "save -> load -> save must be lossless");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn dock_tree_random_operation_sequences_preserve_invariants(
        seed in any::<u64>(),
        steps in 20usize..120,
    ) {
        let (tree, _) = run_sequence(seed, steps);
        assert_tree_invariants(&tree);
    }

    #[test]
    fn dock_tree_random_operation_sequences_replay_deterministically(
        seed in any::<u64>(),
        steps in 20usize..80,
    ) {
        let (final_tree, operations) = run_sequence(seed, steps);
        let replayed = replay(&operations);
        prop_assert_eq!(replayed.state_hash(), final_tree.state_hash());
        prop_assert_eq!(to_dto(&replayed), to_dto(&final_tree));
    }

    #[test]
    fn dock_tree_snapshots_survive_restore(
        seed in any::<u64>(),
        steps in 10usize..60,
    ) {
        let (tree, _) = run_sequence(seed, steps);
        assert_snapshot_stable(&tree);
    }

    #[test]
    fn pinning_twice_is_rejected_without_change(
        seed in any::<u64>(),
        steps in 5usize..40,
    ) {
        let (tree, _) = run_sequence(seed, steps);
        let mut rng = Lcg::new(seed.rotate_left(7));
        let docked = docked_keys(&tree);
        if !docked.is_empty() {
            let key = docked[rng.choose_index(docked.len())].clone();
            let pinned = pin_to_auto_hide(&tree, &key, random_side(&mut rng), None)
                .expect("docked key pins");
            let again = pin_to_auto_hide(&pinned, &key, random_side(&mut rng), None);
            prop_assert_eq!(again, Err(MutationRejected::AlreadyPinned { key }));
        }
    }
}

#[test]
fn dock_tree_fuzz_seed_corpus_preserves_invariants() {
    let seeds = [
        0_u64,
        1,
        2,
        3,
        5,
        8,
        13,
        21,
        34,
        55,
        89,
        144,
        u32::MAX as u64,
        (u32::MAX as u64) + 1,
        u64::MAX - 1,
        u64::MAX,
    ];

    for seed in seeds {
        let (tree, _) = run_sequence(seed, 180);
        assert_tree_invariants(&tree);
        assert_snapshot_stable(&tree);
    }
}
