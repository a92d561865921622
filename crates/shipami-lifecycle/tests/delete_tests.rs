//! Delete integration tests
//!
//! Tests protection rules, snapshot cleanup and lineage repair:
//! - Unmanaged images and releases need force
//! - The parent's `copied_to` loses exactly the deleted entry
//! - Repair problems never fail the delete

mod common;

use common::*;
use shipami_ec2::mock::MockEc2Cloud;
use shipami_lifecycle::CopyOptions;

#[tokio::test]
async fn test_unmanaged_requires_force() {
    let harness = Harness::new();
    let image = harness.source_image(HOME_REGION, "foo");
    let snapshots = harness.cloud.snapshot_ids(&image);

    let err = harness
        .operator
        .delete(&[image.clone()], false)
        .await
        .unwrap_err();
    assert_protected(&err, &image);
    assert!(err.to_string().contains("--force"));
    assert!(harness.cloud.image(&image).is_some());
    assert!(!harness.cloud.was_called("deregister_image"));

    let deleted = harness.operator.delete(&[image.clone()], true).await.unwrap();

    assert_eq!(deleted, vec![image.clone()]);
    assert!(harness.cloud.image(&image).is_none());
    for snapshot_id in snapshots {
        assert!(harness.cloud.snapshot(&snapshot_id).is_none());
    }
    let listed = harness.query.list().await.unwrap();
    assert!(listed.iter().all(|summary| summary.id != image));
}

#[tokio::test]
async fn test_release_requires_force() {
    let harness = Harness::new();
    let source = harness.source_image(HOME_REGION, "foo");
    let release = harness
        .operator
        .release(&source, "1.0.0", &CopyOptions::default())
        .await
        .unwrap();

    let err = harness
        .operator
        .delete(&[release.clone()], false)
        .await
        .unwrap_err();
    assert_protected(&err, &release);

    harness.operator.delete(&[release.clone()], true).await.unwrap();
    assert!(harness.cloud.image(&release).is_none());
    assert_copied_to(&harness, &source, &[]);
}

#[tokio::test]
async fn test_delete_removes_only_own_entry() {
    let harness = Harness::new();
    let parent = harness.source_image(HOME_REGION, "foo");
    let a = harness.copy(&parent).await;
    let b = harness.copy(&parent).await;
    let c = harness.copy(&parent).await;

    harness.operator.delete(&[b], false).await.unwrap();

    assert_copied_to(
        &harness,
        &parent,
        &[
            format!("{}:{}", HOME_REGION, a),
            format!("{}:{}", HOME_REGION, c),
        ],
    );
}

#[tokio::test]
async fn test_delete_only_child_clears_tag() {
    let harness = Harness::new();
    let parent = harness.source_image(HOME_REGION, "foo");
    let child = harness.copy(&parent).await;

    harness.operator.delete(&[child], false).await.unwrap();

    assert_copied_to(&harness, &parent, &[]);
    assert!(harness.cloud.image(&parent).is_some());
}

#[tokio::test]
async fn test_delete_repairs_parent_in_other_region() {
    let harness = Harness::new();
    let parent = harness.source_image(OTHER_REGION, "foo");
    let child = harness
        .operator
        .copy(&parent, &from_region(OTHER_REGION))
        .await
        .unwrap();

    harness.operator.delete(&[child], false).await.unwrap();

    assert_copied_to(&harness, &parent, &[]);
}

#[tokio::test]
async fn test_batch_stops_at_protected_image() {
    let harness = Harness::new();
    let source = harness.source_image(HOME_REGION, "foo");
    let copy = harness.copy(&source).await;
    let other = harness.copy(&source).await;

    let err = harness
        .operator
        .delete(&[copy.clone(), source.clone(), other.clone()], false)
        .await
        .unwrap_err();

    assert_protected(&err, &source);
    assert!(harness.cloud.image(&copy).is_none());
    assert!(harness.cloud.image(&source).is_some());
    assert!(harness.cloud.image(&other).is_some());
    assert_copied_to(&harness, &source, &[format!("{}:{}", HOME_REGION, other)]);
}

#[tokio::test]
async fn test_parent_and_child_in_same_batch() {
    let harness = Harness::new();
    let root = harness.source_image(HOME_REGION, "foo");
    let parent = harness.copy(&root).await;
    let child = harness.copy(&parent).await;

    let deleted = harness
        .operator
        .delete(&[child.clone(), parent.clone()], false)
        .await
        .unwrap();

    assert_eq!(deleted, vec![child, parent]);
    assert_copied_to(&harness, &root, &[]);
}

#[tokio::test]
async fn test_missing_parent_does_not_fail_delete() {
    let harness = Harness::new();
    let parent = harness.source_image(HOME_REGION, "foo");
    let child = harness.copy(&parent).await;

    // force-deleting the parent leaves the child's copied_from stale
    harness.operator.delete(&[parent.clone()], true).await.unwrap();
    assert_eq!(
        harness.tag(&child, COPIED_FROM),
        Some(format!("{}:{}", HOME_REGION, parent))
    );

    let deleted = harness.operator.delete(&[child.clone()], false).await.unwrap();
    assert_eq!(deleted, vec![child]);
}

#[tokio::test]
async fn test_malformed_parent_pointer_is_ignored() {
    let harness = Harness::new();
    let image = harness.source_image(HOME_REGION, "foo");
    harness.cloud.seed_tag(&image, MANAGED, "True");
    harness.cloud.seed_tag(&image, COPIED_FROM, "not-a-pointer");

    let deleted = harness.operator.delete(&[image.clone()], false).await.unwrap();

    assert_eq!(deleted, vec![image]);
}

#[tokio::test]
async fn test_deregister_failure_keeps_snapshots() {
    let harness = Harness::new();
    let source = harness.source_image(HOME_REGION, "foo");
    let copy = harness.copy(&source).await;
    harness
        .cloud
        .fail_next("deregister_image", "You do not have permission");

    let err = harness
        .operator
        .delete(&[copy.clone()], false)
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert_eq!(err.to_string(), "You do not have permission");
    assert!(!harness.cloud.was_called("delete_snapshot"));
    assert_copied_to(&harness, &source, &[format!("{}:{}", HOME_REGION, copy)]);
}

#[tokio::test(start_paused = true)]
async fn test_pending_image_snapshots_are_deleted() {
    let harness = Harness::with_cloud(MockEc2Cloud::with_settle_polls(3));
    let source = harness.source_image(HOME_REGION, "foo");
    let copy = harness.copy(&source).await;
    let snapshots = harness.cloud.snapshot_ids(&copy);

    harness.operator.delete(&[copy], false).await.unwrap();

    assert_eq!(snapshots.len(), 2);
    for snapshot_id in snapshots {
        assert!(harness.cloud.snapshot(&snapshot_id).is_none());
    }
}

#[tokio::test]
async fn test_unknown_image_is_not_found() {
    let harness = Harness::new();

    let err = harness
        .operator
        .delete(&["ami-00000000".to_string()], true)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}
