mod common;
use crate::common::builders::MockTreeBuilder;

use std::collections::BTreeSet;
use std::path::PathBuf;

use proptest::prelude::*;

use dirwatch::watch::{HandleEvent, Node};

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set("[a-f]{1,3}", 0..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // known' = known ∪ (listing − known): rescans only ever add.
    #[test]
    fn rescan_adds_listing_minus_known(
        initial in names(),
        added in names(),
        removed in names(),
    ) {
        let mut builder = MockTreeBuilder::new();
        for name in &initial {
            builder = builder.dir(name);
        }
        let tree = builder.build();
        let root = Node::with_context(tree.path(""), true, tree.ctx.clone());
        prop_assert!(root.start());

        let before: BTreeSet<PathBuf> = root.known_subdirectories().into_iter().collect();
        let expected_before: BTreeSet<PathBuf> = initial.iter().map(|n| tree.path(n)).collect();
        prop_assert_eq!(&before, &expected_before);

        for name in &added {
            tree.fs.add_dir(tree.path(name));
        }
        for name in &removed {
            tree.fs.remove(tree.path(name));
        }
        let listing: BTreeSet<PathBuf> = initial
            .union(&added)
            .filter(|n| !removed.contains(*n))
            .map(|n| tree.path(n))
            .collect();

        tree.backend.emit(tree.path(""), HandleEvent::Changed);
        tree.ctx.executor().drain().unwrap();

        let after: BTreeSet<PathBuf> = root.known_subdirectories().into_iter().collect();
        let expected: BTreeSet<PathBuf> = before
            .union(&listing.difference(&before).cloned().collect())
            .cloned()
            .collect();
        prop_assert_eq!(&after, &expected);

        let children: BTreeSet<PathBuf> = root.child_paths().into_iter().collect();
        prop_assert_eq!(children, after);
    }
}
