//! Property-based tests for generated-file path safety

use proptest::prelude::*;
use stackgen::workspace::{is_relative_path_safe, is_safe, resolve_within};
use tempfile::TempDir;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,11}".prop_filter("not a dot segment", |s| s != "." && s != "..")
}

/// Any path built only from ordinary segments stays inside the root
#[test]
fn test_plain_relative_paths_resolve_inside_root() {
    let root = TempDir::new().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(segment(), 1..6), |segments| {
            let candidate = segments.join("/");
            prop_assert!(is_relative_path_safe(&candidate));

            let resolved = resolve_within(root.path(), &candidate).unwrap();
            let canonical_root = dunce::canonicalize(root.path()).unwrap();
            prop_assert!(resolved.starts_with(&canonical_root));
            prop_assert!(resolved != canonical_root);
            Ok(())
        })
        .unwrap();
}

/// Climbing above the root with `..` is always caught, by both checks
#[test]
fn test_climbing_out_is_rejected() {
    let root = TempDir::new().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(prop::collection::vec(segment(), 0..4), 1usize..4, segment()),
            |(down, extra_up, leaf)| {
                let mut parts: Vec<String> = down.clone();
                parts.extend(std::iter::repeat("..".to_string()).take(down.len() + extra_up));
                parts.push(leaf);
                let candidate = parts.join("/");

                prop_assert!(!is_relative_path_safe(&candidate));
                prop_assert!(!is_safe(root.path(), &candidate));
                Ok(())
            },
        )
        .unwrap();
}

/// Absolute candidates never pass the syntactic plan check
#[test]
fn test_absolute_paths_fail_syntactic_check() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(segment(), 1..4), |segments| {
            let unix = format!("/{}", segments.join("/"));
            let windows = format!("C:\\{}", segments.join("\\"));
            prop_assert!(!is_relative_path_safe(&unix));
            prop_assert!(!is_relative_path_safe(&windows));
            Ok(())
        })
        .unwrap();
}
