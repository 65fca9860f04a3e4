mod support;

use std::time::Duration;

use studio_sync::models::*;
use studio_sync::sync::{DelayedSync, SyncOutcome};
use support::{inline, reconciler, FakeRemote};

fn save_with_references(db: &studio_sync::db::Database, id: &str, count: usize) {
    let mut input = NewLocalProject::untitled(id);
    input.snapshot.reference_images = (0..count).map(|n| inline(&format!("ref{}", n))).collect();
    db.save(input).expect("Failed to save project");
}

fn actions(project: &LocalProject) -> Vec<&'static str> {
    project.events.iter().map(|e| e.action.as_str()).collect()
}

mod sync_project {
    use super::*;

    #[tokio::test]
    async fn links_uploads_and_marks_synced() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        let db = sync.database();
        let mut input = NewLocalProject::untitled("local-1");
        input.snapshot.primary_image = Some(inline("primary"));
        db.save(input).unwrap();

        let outcome = sync.sync_project("local-1").await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                remote_id: "proj-1".to_string(),
                uploaded: 1,
                failed_uploads: 0,
            }
        );
        let project = db.get("local-1").unwrap().unwrap();
        let url = FakeRemote::public_url("user-1", "proj-1", "primary");
        assert_eq!(project.status, SyncStatus::Synced);
        assert_eq!(project.remote_id.as_deref(), Some("proj-1"));
        assert_eq!(project.snapshot.primary_image, Some(Image::new(url.clone())));
        assert_eq!(project.thumbnail.as_deref(), Some(url.as_str()));
        assert_eq!(actions(&project), vec!["sync_start", "linked", "sync_success"]);

        let state = remote.state();
        assert_eq!(state.updates.len(), 1);
        assert_eq!(state.updates[0].primary_image_url.as_deref(), Some(url.as_str()));
        assert_eq!(sync.remote_projects().len(), 1);
    }

    #[tokio::test]
    async fn survives_a_failed_reference_upload() {
        let remote = FakeRemote::new();
        remote.configure(|state| state.fail_uploads = vec![ArtifactRole::Reference(1)]);
        let sync = reconciler(remote.clone(), Some("user-1"));
        save_with_references(sync.database(), "local-1", 3);

        let outcome = sync.sync_project("local-1").await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                remote_id: "proj-1".to_string(),
                uploaded: 2,
                failed_uploads: 1,
            }
        );
        let project = sync.database().get("local-1").unwrap().unwrap();
        assert_eq!(project.status, SyncStatus::Synced);

        let references = &project.snapshot.reference_images;
        assert!(!references[0].is_inline());
        assert_eq!(references[1], inline("ref1"));
        assert!(!references[2].is_inline());

        let failures: Vec<&EventAction> = project
            .events
            .iter()
            .map(|e| &e.action)
            .filter(|a| matches!(a, EventAction::SyncFailure { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0],
            EventAction::SyncFailure { artifact: Some(artifact), .. } if artifact == "reference image #2"
        ));
    }

    #[tokio::test]
    async fn retries_only_the_artifacts_still_inline() {
        let remote = FakeRemote::new();
        remote.configure(|state| state.fail_uploads = vec![ArtifactRole::Reference(1)]);
        let sync = reconciler(remote.clone(), Some("user-1"));
        save_with_references(sync.database(), "local-1", 3);
        sync.sync_project("local-1").await.unwrap();

        remote.configure(|state| state.fail_uploads.clear());
        let outcome = sync.sync_project("local-1").await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                remote_id: "proj-1".to_string(),
                uploaded: 1,
                failed_uploads: 0,
            }
        );
        let state = remote.state();
        assert_eq!(state.created.len(), 1);
        assert_eq!(state.uploads.len(), 4);
        assert_eq!(state.uploads[3].role, ArtifactRole::Reference(1));

        let project = sync.database().get("local-1").unwrap().unwrap();
        assert!(project.snapshot.inline_artifacts().is_empty());
    }

    #[tokio::test]
    async fn is_idempotent_once_synced() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        save_with_references(sync.database(), "local-1", 2);
        sync.database()
            .append_revision(
                "local-1",
                Revision::new("start", RevisionType::InitialSnapshot, ProjectSnapshot::default()),
            )
            .unwrap();
        sync.sync_project("local-1").await.unwrap();
        let before = sync.database().get("local-1").unwrap().unwrap();

        let outcome = sync.sync_project("local-1").await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::AlreadySynced {
                remote_id: "proj-1".to_string()
            }
        );
        let after = sync.database().get("local-1").unwrap().unwrap();
        assert_eq!(after.status, SyncStatus::Synced);
        assert_eq!(after.revisions.len(), 1);
        assert_eq!(after.events.len(), before.events.len());
        assert_eq!(remote.state().created.len(), 1);
        assert_eq!(remote.state().uploads.len(), 2);
    }

    #[tokio::test]
    async fn leaves_the_project_pending_when_creation_fails() {
        let remote = FakeRemote::new();
        remote.configure(|state| state.fail_create = true);
        let sync = reconciler(remote.clone(), Some("user-1"));
        save_with_references(sync.database(), "local-1", 1);

        let outcome = sync.sync_project("local-1").await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Failed { .. }));
        let project = sync.database().get("local-1").unwrap().unwrap();
        assert_eq!(project.status, SyncStatus::Pending);
        assert!(project.remote_id.is_none());
        assert_eq!(project.snapshot.reference_images, vec![inline("ref0")]);
        assert_eq!(actions(&project), vec!["sync_start", "sync_failure"]);
        assert!(remote.state().uploads.is_empty());

        remote.configure(|state| state.fail_create = false);
        let retried = sync.sync_project("local-1").await.unwrap();
        assert_eq!(retried.remote_id(), Some("proj-1"));
    }

    #[tokio::test]
    async fn keeps_artifacts_inline_without_a_signed_in_owner() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), None);
        save_with_references(sync.database(), "local-1", 1);

        let outcome = sync.sync_project("local-1").await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                remote_id: "proj-1".to_string(),
                uploaded: 0,
                failed_uploads: 0,
            }
        );
        assert!(remote.state().uploads.is_empty());

        sync.set_owner(Some("user-1".to_string()));
        let outcome = sync.sync_project("local-1").await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Synced { uploaded: 1, .. }));
        assert_eq!(remote.state().uploads[0].owner_id, "user-1");
    }

    #[tokio::test]
    async fn reuses_an_existing_remote_link() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        save_with_references(sync.database(), "local-1", 1);
        sync.database().link_remote("local-1", "proj-42").unwrap();

        let outcome = sync.sync_project("local-1").await.unwrap();

        assert_eq!(outcome.remote_id(), Some("proj-42"));
        assert!(remote.state().created.is_empty());
        assert_eq!(remote.state().uploads[0].project_id, "proj-42");
    }

    #[tokio::test]
    async fn keys_reference_uploads_by_content_across_list_changes() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        let db = sync.database();
        save_with_references(db, "local-1", 2);
        sync.sync_project("local-1").await.unwrap();
        let first = db.get("local-1").unwrap().unwrap().snapshot.reference_images;

        // Drop the first reference and add a new one in the freed position.
        db.update(
            "local-1",
            ProjectPatch {
                reference_images: Some(vec![first[1].clone(), inline("ref2")]),
                status: Some(SyncStatus::Pending),
                ..ProjectPatch::default()
            },
        )
        .unwrap();
        let outcome = sync.sync_project("local-1").await.unwrap();

        assert!(matches!(outcome, SyncOutcome::Synced { uploaded: 1, .. }));
        let uploads = remote.state().uploads;
        assert_eq!(uploads.len(), 3);
        assert_eq!(uploads[2].role, ArtifactRole::Reference(1));
        let keys: Vec<String> = uploads.iter().map(|u| u.key()).collect();
        assert!(!keys[..2].contains(&keys[2]));

        let references = db.get("local-1").unwrap().unwrap().snapshot.reference_images;
        assert_eq!(references[0], first[1]);
        assert!(!references[1].is_inline());
        assert_ne!(references[1], references[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_syncs_create_one_remote_project() {
        let remote = FakeRemote::new();
        remote.configure(|state| state.create_delay = Some(Duration::from_millis(50)));
        let sync = reconciler(remote.clone(), Some("user-1"));
        save_with_references(sync.database(), "local-1", 1);

        let (single, pending) = tokio::join!(sync.sync_project("local-1"), sync.sync_pending());

        assert_eq!(single.unwrap().remote_id(), Some("proj-1"));
        let pending = pending.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].1,
            SyncOutcome::AlreadySynced {
                remote_id: "proj-1".to_string()
            }
        );
        let state = remote.state();
        assert_eq!(state.created.len(), 1);
        assert_eq!(state.uploads.len(), 1);
        let project = sync.database().get("local-1").unwrap().unwrap();
        assert_eq!(project.remote_id.as_deref(), Some("proj-1"));
        assert_eq!(project.status, SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn an_edit_during_sync_leaves_the_project_pending() {
        let remote = FakeRemote::new();
        remote.configure(|state| state.update_delay = Some(Duration::from_millis(50)));
        let sync = reconciler(remote.clone(), Some("user-1"));
        let db = sync.database();
        save_with_references(db, "local-1", 1);

        let edit = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            db.update(
                "local-1",
                ProjectPatch {
                    prompt: Some("add a scarf".to_string()),
                    status: Some(SyncStatus::Pending),
                    ..ProjectPatch::default()
                },
            )
            .unwrap();
        };
        let (outcome, _) = tokio::join!(sync.sync_project("local-1"), edit);

        assert_eq!(
            outcome.unwrap(),
            SyncOutcome::Outdated {
                remote_id: "proj-1".to_string(),
                uploaded: 1,
                failed_uploads: 0,
            }
        );
        let project = db.get("local-1").unwrap().unwrap();
        assert_eq!(project.status, SyncStatus::Pending);
        assert_eq!(project.remote_id.as_deref(), Some("proj-1"));
        assert_eq!(project.snapshot.prompt.as_deref(), Some("add a scarf"));
        assert!(!project.snapshot.reference_images[0].is_inline());
        assert!(!actions(&project).contains(&"sync_success"));
        assert_eq!(db.pending().unwrap().len(), 1);

        remote.configure(|state| state.update_delay = None);
        let retried = sync.sync_project("local-1").await.unwrap();
        assert!(matches!(retried, SyncOutcome::Synced { uploaded: 0, .. }));
        assert_eq!(remote.state().created.len(), 1);
        assert_eq!(
            remote.state().updates[1].data.as_ref().unwrap()["prompt"],
            "add a scarf"
        );
    }

    #[tokio::test]
    async fn fails_for_an_unknown_project() {
        let sync = reconciler(FakeRemote::new(), None);

        let result = sync.sync_project("missing").await;

        assert!(matches!(result, Err(studio_sync::db::StoreError::NotFound(_))));
    }
}

mod sync_pending {
    use super::*;

    #[tokio::test]
    async fn syncs_every_project_not_yet_synced() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        let db = sync.database();
        db.save(NewLocalProject::untitled("local-1")).unwrap();
        db.save(NewLocalProject::untitled("local-2")).unwrap();
        let mut linked = NewLocalProject::untitled("local-3");
        linked.remote_id = Some("proj-3".to_string());
        db.save(linked).unwrap();

        let outcomes = sync.sync_pending().await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(db.pending().unwrap().is_empty());
        assert_eq!(remote.state().created.len(), 2);
    }

    #[test]
    fn does_nothing_on_an_empty_store() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), None);

        let outcomes = tokio_test::block_on(sync.sync_pending()).unwrap();

        assert!(outcomes.is_empty());
        assert!(remote.state().created.is_empty());
    }
}

mod delayed_sync {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_delay() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        sync.database().save(NewLocalProject::untitled("local-1")).unwrap();

        let timer = DelayedSync::schedule(sync.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(remote.state().created.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        while !timer.is_finished() {
            tokio::task::yield_now().await;
        }
        assert_eq!(remote.state().created.len(), 1);
        assert!(sync.database().pending().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_fire_once_cancelled() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        sync.database().save(NewLocalProject::untitled("local-1")).unwrap();

        let mut timer = DelayedSync::schedule(sync.clone(), Duration::from_secs(60));
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(remote.state().created.is_empty());
        assert_eq!(sync.database().pending().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_fire_once_dropped() {
        let remote = FakeRemote::new();
        let sync = reconciler(remote.clone(), Some("user-1"));
        sync.database().save(NewLocalProject::untitled("local-1")).unwrap();

        drop(DelayedSync::schedule(sync.clone(), Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(remote.state().created.is_empty());
    }
}
