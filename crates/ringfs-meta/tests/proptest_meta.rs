//! Property-based tests for ringfs-meta using proptest.
//!
//! These tests check the persistent tree against a plain `BTreeMap` model and
//! the volume registry's ordering guarantees over arbitrary inputs.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{dir, new_service};
use proptest::prelude::*;
use ringfs_meta::kvstore::Snapshot;
use ringfs_meta::{MetaError, MetaPath, MetadataService};

/// Generator for short volume names without the key delimiter.
fn any_volume_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}"
}

/// Generator for key/value write batches.
fn any_batches() -> impl Strategy<Value = Vec<Vec<(Vec<u8>, u32)>>> {
    proptest::collection::vec(
        proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 0..6), any::<u32>()),
            0..20,
        ),
        1..6,
    )
}

proptest! {
    #[test]
    fn prop_tree_matches_model(batches in any_batches()) {
        let mut snapshot = Snapshot::new();
        let mut model = BTreeMap::new();
        let mut history = Vec::new();

        for batch in batches {
            let mut tx = snapshot.txn();
            for (key, value) in batch {
                tx.insert(key.clone(), value);
                model.insert(key, value);
            }
            snapshot = tx.commit();
            history.push((snapshot.clone(), model.clone()));
        }

        // Every snapshot still reflects the model as of its own commit.
        for (snap, expected) in &history {
            let got: Vec<(Vec<u8>, u32)> = snap.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
            let want: Vec<(Vec<u8>, u32)> = expected.iter().map(|(k, v)| (k.clone(), *v)).collect();
            prop_assert_eq!(got, want);
            prop_assert_eq!(snap.len(), expected.len());
        }
    }

    #[test]
    fn prop_scan_prefix_matches_filter(
        keys in proptest::collection::btree_set(proptest::collection::vec(0u8..4, 0..5), 0..40),
        prefix in proptest::collection::vec(0u8..4, 0..3),
    ) {
        let mut tx = Snapshot::new().txn();
        for key in &keys {
            tx.insert(key.clone(), ());
        }
        let snap = tx.commit();

        let got: Vec<Vec<u8>> = snap.scan_prefix(&prefix).into_iter().map(|(k, _)| k).collect();
        let want: Vec<Vec<u8>> = keys.iter().filter(|k| k.starts_with(&prefix)).cloned().collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn prop_volume_ids_strictly_increase(names in proptest::collection::vec(any_volume_name(), 1..12)) {
        let svc = new_service();
        let mut created = BTreeSet::new();
        let mut last = 0;
        for name in names {
            match svc.create_volume(&name) {
                Ok(()) => {
                    prop_assert!(created.insert(name.clone()));
                    let id = svc.resolve_volume_id(&name).unwrap().as_u64();
                    prop_assert!(id > last);
                    last = id;
                }
                Err(MetaError::AlreadyExists { .. }) => prop_assert!(created.contains(&name)),
                Err(other) => return Err(TestCaseError::fail(format!("unexpected error {}", other))),
            }
        }
        let listed: BTreeSet<String> = svc.list_volumes().unwrap().into_iter().collect();
        prop_assert_eq!(listed, created);
    }

    #[test]
    fn prop_listed_children_are_exactly_created_dirs(
        names in proptest::collection::btree_set("[a-c]{1,2}", 1..8),
    ) {
        let svc = new_service();
        svc.create_volume("v").unwrap();
        svc.make_directory(&MetaPath::new("v", "/top"), dir()).unwrap();
        for name in &names {
            svc.make_directory(&MetaPath::new("v", format!("/top/{}", name)), dir()).unwrap();
        }

        let (_, children) = svc.get_directory(&MetaPath::new("v", "/top")).unwrap();
        let got: Vec<String> = children.into_iter().map(|p| p.path).collect();
        let want: Vec<String> = names.iter().map(|n| format!("/top/{}/", n)).collect();
        prop_assert_eq!(got, want);
    }
}
