//! Assertion helpers for lineage tags

use shipami_core::Error;

use super::constants::*;
use super::fixtures::Harness;

/// Assert that `child` is a managed copy of `parent` and linked both ways
pub fn assert_linked(harness: &Harness, parent: (&str, &str), child: (&str, &str)) {
    let (parent_region, parent_id) = parent;
    let (child_region, child_id) = child;

    assert_eq!(
        harness.tag(child_id, MANAGED).as_deref(),
        Some("True"),
        "{} is not managed",
        child_id
    );
    assert_eq!(
        harness.tag(child_id, COPIED_FROM),
        Some(format!("{}:{}", parent_region, parent_id)),
        "{} does not point at its parent",
        child_id
    );

    let entry = format!("{}:{}", child_region, child_id);
    let copied_to = harness.tag(parent_id, COPIED_TO).unwrap_or_default();
    assert!(
        copied_to.split(',').any(|e| e == entry),
        "{} copied_to {:?} does not contain {}",
        parent_id,
        copied_to,
        entry
    );
}

/// Assert the exact `copied_to` entries of an image, in order
pub fn assert_copied_to(harness: &Harness, image_id: &str, expected: &[String]) {
    let actual = harness.tag(image_id, COPIED_TO);
    if expected.is_empty() {
        assert_eq!(actual, None, "{} should have no copied_to tag", image_id);
    } else {
        assert_eq!(actual, Some(expected.join(",")));
    }
}

/// Assert that an error is a refusal to delete `image_id`
pub fn assert_protected(err: &Error, image_id: &str) {
    match err {
        Error::ProtectedResource { image_id: id } => assert_eq!(id, image_id),
        other => panic!("expected protected resource error, got: {other}"),
    }
}
