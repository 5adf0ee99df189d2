//! Portable table round-trip and rejection tests.
//!
//! Serialises hierarchy tables to JSON, loads them into another hierarchy and
//! checks that malformed documents are rejected without touching the target.

#[cfg(feature = "serde")]
mod tests {
    use hhmm_core::portable::{HierarchySnapshot, LabelRecord, PortableTables, TransitionRecord};
    use hhmm_core::{GaussianHmm, GaussianState, Hierarchy, HierarchyError};

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn model(mean: f64) -> GaussianHmm {
        GaussianHmm::left_right(vec![
            GaussianState::new(vec![mean], vec![1.0]).unwrap(),
            GaussianState::new(vec![mean + 1.0], vec![1.0]).unwrap(),
        ])
        .unwrap()
    }

    fn hierarchy(labels: &[&str]) -> Hierarchy<GaussianHmm> {
        let mut h = Hierarchy::default();
        for (i, l) in labels.iter().enumerate() {
            h.add_class(l.to_string(), model(i as f64 * 3.0)).unwrap();
        }
        h
    }

    fn skewed() -> Hierarchy<GaussianHmm> {
        let mut h = hierarchy(&["a", "b", "c"]);
        let (a, b, c) = ("a".to_string(), "b".to_string(), "c".to_string());
        h.set_prior(&a, 0.6).unwrap();
        h.set_prior(&b, 0.3).unwrap();
        h.set_prior(&c, 0.1).unwrap();
        h.set_transition(&a, &b, 0.9).unwrap();
        h.set_exit_transition(&c, 0.7).unwrap();
        h.normalize_transitions();
        h
    }

    // ── Round trip ───────────────────────────────────────────────────────────

    #[test]
    fn test_json_round_trip_reproduces_tables() {
        let source = skewed();
        let json = serde_json::to_string(&source.to_portable()).unwrap();
        let tables: PortableTables<String> = serde_json::from_str(&json).unwrap();

        let mut target = hierarchy(&["a", "b", "c"]);
        target.load_portable(&tables).unwrap();

        for src in source.labels() {
            assert!((target.prior(src) - source.prior(src)).abs() < 1e-12);
            assert!((target.exit_transition(src) - source.exit_transition(src)).abs() < 1e-12);
            for dst in source.labels() {
                assert!((target.transition(src, dst) - source.transition(src, dst)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let source = skewed();
        let json = serde_json::to_string_pretty(&source.to_snapshot()).unwrap();
        let snapshot: HierarchySnapshot<String, GaussianHmm> = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.classes.len(), 3);

        let mut restored = Hierarchy::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.labels().collect::<Vec<_>>(), source.labels().collect::<Vec<_>>());
        assert!((restored.prior(&"a".to_string()) - 0.6).abs() < 1e-12);
        restored.filter(&[0.0]).unwrap();
    }

    // ── Rejection ────────────────────────────────────────────────────────────

    #[test]
    fn test_unknown_label_leaves_tables_unchanged() {
        let mut h = skewed();
        let before = h.tables().clone();
        let mut tables = h.to_portable();
        tables.transition[0] = TransitionRecord {
            source: "a".to_string(),
            destination: "ghost".to_string(),
            probability: 1.0,
        };

        let err = h.load_portable(&tables).unwrap_err();
        assert_eq!(err, HierarchyError::UnknownLabel("ghost".into()));
        assert!(err.is_structural());
        assert_eq!(h.tables(), &before);
    }

    #[test]
    fn test_missing_records_rejected() {
        let mut h = skewed();
        let before = h.tables().clone();
        let mut tables = h.to_portable();
        tables.transition.pop();
        tables.exit_transition.push(LabelRecord {
            label: "a".to_string(),
            probability: 0.5,
        });

        assert_eq!(
            h.load_portable(&tables),
            Err(HierarchyError::CardinalityMismatch {
                table: "transition",
                expected: 9,
                found: 8
            })
        );
        assert_eq!(h.tables(), &before);
    }

    #[test]
    fn test_snapshot_with_inconsistent_model_rejected() {
        let mut json = serde_json::to_value(skewed().to_snapshot()).unwrap();
        json["classes"][1]["model"]["exit_probabilities"] = serde_json::json!([0.0]);
        let snapshot: HierarchySnapshot<String, GaussianHmm> = serde_json::from_value(json).unwrap();
        assert!(matches!(
            Hierarchy::from_snapshot(snapshot),
            Err(HierarchyError::InvalidParameter(_))
        ));

        let mut json = serde_json::to_value(skewed().to_snapshot()).unwrap();
        json["classes"][0]["model"]["states"][0]["variance"] = serde_json::json!([0.0]);
        let snapshot: HierarchySnapshot<String, GaussianHmm> = serde_json::from_value(json).unwrap();
        assert!(Hierarchy::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_tables_from_larger_hierarchy_rejected() {
        let source = hierarchy(&["a", "b", "c"]);
        let mut target = hierarchy(&["a", "b"]);
        let err = target.load_portable(&source.to_portable()).unwrap_err();
        assert_eq!(err, HierarchyError::UnknownLabel("c".into()));
    }
}
