use std::collections::HashSet;

use storax_core::{resolve_name, ConflictPolicy};

fn taken(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn resolver_law_absent_base_is_identity() {
    let existing = taken(&["other.txt"]);
    for policy in [
        ConflictPolicy::Fail,
        ConflictPolicy::Replace,
        ConflictPolicy::RenameNew,
        ConflictPolicy::RenameManual,
    ] {
        assert_eq!(
            resolve_name(|n| existing.contains(n), "a.txt", policy, Some("manual.txt")).as_deref(),
            Some("a.txt"),
            "policy {policy:?} must pass an absent base through unchanged"
        );
    }
}

#[test]
fn resolver_law_existing_name_only_under_replace() {
    let existing = taken(&["a.txt", "a.txt (1)"]);
    let exists = |n: &str| existing.contains(n);

    // FAIL declines.
    assert_eq!(resolve_name(exists, "a.txt", ConflictPolicy::Fail, None), None);

    // REPLACE is the only policy allowed to return an existing name.
    assert_eq!(
        resolve_name(exists, "a.txt", ConflictPolicy::Replace, None).as_deref(),
        Some("a.txt")
    );

    // RENAME_NEW yields the minimal free suffix.
    assert_eq!(
        resolve_name(exists, "a.txt", ConflictPolicy::RenameNew, None).as_deref(),
        Some("a.txt (2)")
    );
}

#[test]
fn resolver_law_rename_new_minimal_k() {
    for occupied in 0..5usize {
        let names: Vec<String> = std::iter::once("f".to_string())
            .chain((1..=occupied).map(|k| format!("f ({k})")))
            .collect();
        let existing: HashSet<String> = names.into_iter().collect();
        let resolved =
            resolve_name(|n| existing.contains(n), "f", ConflictPolicy::RenameNew, None).unwrap();
        assert_eq!(resolved, format!("f ({})", occupied + 1));
    }
}

#[test]
fn resolver_law_manual_requires_non_empty() {
    let existing = taken(&["a.txt"]);
    let exists = |n: &str| existing.contains(n);

    assert_eq!(
        resolve_name(exists, "a.txt", ConflictPolicy::RenameManual, Some("b.txt")).as_deref(),
        Some("b.txt")
    );
    assert_eq!(
        resolve_name(exists, "a.txt", ConflictPolicy::RenameManual, Some("")),
        None
    );
    assert_eq!(
        resolve_name(exists, "a.txt", ConflictPolicy::RenameManual, None),
        None
    );
}
