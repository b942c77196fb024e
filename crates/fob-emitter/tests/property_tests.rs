//! Property-based tests for reference ids and output names.

use fob_emitter::{AssetOutputOptions, EmittedAsset, FileEmitter, OutputBundle};
use proptest::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::Arc;

fn seed_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec![
        "a.txt".to_string(),
        "b.txt".to_string(),
        "logo.png".to_string(),
        "nested/file.css".to_string(),
    ]))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: reference ids never repeat within a family, whatever the seeds.
    #[test]
    fn prop_reference_ids_unique(
        parent_seeds in prop::collection::vec(seed_strategy(), 1..40),
        child_seeds in prop::collection::vec(seed_strategy(), 0..20),
    ) {
        let parent = Arc::new(FileEmitter::default());
        let child = parent.create_output_emitter();
        let mut seen = FxHashSet::default();

        for seed in parent_seeds {
            let id = parent.emit_file(EmittedAsset { name: seed, ..Default::default() }).unwrap();
            prop_assert!(seen.insert(id));
        }
        for seed in child_seeds {
            let id = child.emit_file(EmittedAsset { name: seed, ..Default::default() }).unwrap();
            prop_assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
            prop_assert!(seen.insert(id));
        }
    }

    /// Property: one bundle entry per distinct content, and every id resolves into the bundle.
    #[test]
    fn prop_one_entry_per_content(
        assets in prop::collection::vec((seed_strategy(), 0u8..4), 1..30),
    ) {
        let emitter = FileEmitter::default();
        let mut ids = Vec::new();
        let mut contents = FxHashSet::default();
        for (name, content) in &assets {
            contents.insert(*content);
            let id = emitter
                .emit_file(EmittedAsset {
                    name: name.clone(),
                    source: Some(vec![*content].into()),
                    ..Default::default()
                })
                .unwrap();
            ids.push(id);
        }

        emitter
            .set_output_bundle(OutputBundle::new(), AssetOutputOptions::new("[name]-[hash:6][extname]"))
            .unwrap();
        let bundle = emitter.output_bundle().unwrap();

        prop_assert_eq!(bundle.len(), contents.len());
        for id in &ids {
            let file_name = emitter.get_file_name(id).unwrap();
            prop_assert!(bundle.contains(&file_name));
        }
    }
}
