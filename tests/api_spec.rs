mod support;

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use studio_sync::api::create_router;
use studio_sync::models::*;
use studio_sync::remote::RemoteProject;
use studio_sync::sync::SyncReconciler;
use support::{inline, reconciler, FakeRemote};

fn setup() -> (TestServer, Arc<SyncReconciler<FakeRemote>>) {
    let sync = reconciler(FakeRemote::new(), Some("user-1"));
    let app = create_router(sync.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, sync)
}

async fn create_project(server: &TestServer, id: &str) -> LocalProject {
    server
        .post("/api/v1/projects")
        .json(&NewLocalProject::untitled(id))
        .await
        .json::<LocalProject>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (server, _) = setup();

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}

mod projects {
    use super::*;

    #[tokio::test]
    async fn creates_a_pending_project() {
        let (server, _) = setup();

        let response = server
            .post("/api/v1/projects")
            .json(&json!({
                "id": "local-1",
                "name": "Hat study",
                "prompt": "a cat in a hat",
                "reference_images": [inline("hat")],
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let project: LocalProject = response.json();
        assert_eq!(project.id, "local-1");
        assert_eq!(project.status, SyncStatus::Pending);
        assert_eq!(project.snapshot.prompt.as_deref(), Some("a cat in a hat"));
        assert_eq!(project.snapshot.reference_images, vec![inline("hat")]);
    }

    #[tokio::test]
    async fn rejects_a_duplicate_id() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;

        let response = server
            .post("/api/v1/projects")
            .json(&NewLocalProject::untitled("local-1"))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn lists_projects_with_their_events() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;
        create_project(&server, "local-2").await;

        let response = server.get("/api/v1/projects").await;

        response.assert_status_ok();
        let projects: Vec<LocalProject> = response.json();
        assert_eq!(projects.len(), 2);
        assert!(projects
            .iter()
            .all(|p| p.events.len() == 1 && p.events[0].action == EventAction::Created));
    }

    #[tokio::test]
    async fn returns_not_found_for_an_unknown_id() {
        let (server, _) = setup();

        server
            .get("/api/v1/projects/missing")
            .await
            .assert_status_not_found();
        server
            .put("/api/v1/projects/missing")
            .json(&json!({ "prompt": "add hat" }))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn updates_fields_in_place() {
        let (server, _) = setup();
        let created = create_project(&server, "local-1").await;

        let response = server
            .put("/api/v1/projects/local-1")
            .json(&json!({ "prompt": "add hat" }))
            .await;

        response.assert_status_ok();
        let project: LocalProject = response.json();
        assert_eq!(project.snapshot.prompt.as_deref(), Some("add hat"));
        assert!(project.updated_at > created.updated_at);
    }
}

mod history {
    use super::*;

    #[tokio::test]
    async fn appends_events_in_order() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;

        server
            .post("/api/v1/projects/local-1/events")
            .json(&json!({ "action": "save_on_exit" }))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .post("/api/v1/projects/local-1/events")
            .json(&json!({
                "action": "sync_failure",
                "payload": { "error": "offline" },
                "label": "Offline",
            }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let project: LocalProject = server.get("/api/v1/projects/local-1").await.json();
        let actions: Vec<&str> = project.events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["created", "save_on_exit", "sync_failure"]);
        assert_eq!(project.events[2].label, "Offline");
    }

    #[tokio::test]
    async fn appends_a_revision() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;
        let revision = Revision::new("Apply filter", RevisionType::FilterApply, ProjectSnapshot::default())
            .with_payload(RevisionPayload::Filter {
                previous: None,
                next: Some("noir".to_string()),
            });

        server
            .post("/api/v1/projects/local-1/revisions")
            .json(&revision)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let project: LocalProject = server.get("/api/v1/projects/local-1").await.json();
        assert_eq!(project.revisions, vec![revision]);
    }

    #[tokio::test]
    async fn rejects_a_revision_with_the_wrong_payload() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;
        let revision = Revision::new("Apply filter", RevisionType::FilterApply, ProjectSnapshot::default())
            .with_payload(RevisionPayload::Reference { image: inline("hat") });

        server
            .post("/api/v1/projects/local-1/revisions")
            .json(&revision)
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}

mod linking {
    use super::*;

    #[tokio::test]
    async fn marks_synced_and_finds_by_remote_id() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;

        server
            .get("/api/v1/projects/by-remote/proj-42")
            .await
            .assert_status_not_found();

        let response = server
            .post("/api/v1/projects/local-1/synced")
            .json(&json!({ "remote_id": "proj-42" }))
            .await;
        response.assert_status_ok();

        let found: LocalProject = server.get("/api/v1/projects/by-remote/proj-42").await.json();
        assert_eq!(found.id, "local-1");
        assert_eq!(found.status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn refuses_to_relink_a_synced_project() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;
        server
            .post("/api/v1/projects/local-1/synced")
            .json(&json!({ "remote_id": "proj-42" }))
            .await
            .assert_status_ok();

        server
            .post("/api/v1/projects/local-1/synced")
            .json(&json!({ "remote_id": "proj-99" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}

mod sync {
    use super::*;

    #[tokio::test]
    async fn syncs_one_project() {
        let (server, sync) = setup();
        create_project(&server, "local-1").await;

        let response = server.post("/api/v1/projects/local-1/sync").await;

        response.assert_status_ok();
        let report: Value = response.json();
        assert_eq!(report["outcome"], "synced");
        assert_eq!(report["remote_id"], "proj-1");
        assert_eq!(
            sync.database().get("local-1").unwrap().unwrap().status,
            SyncStatus::Synced
        );

        let remote: Vec<RemoteProject> = server.get("/api/v1/remote-projects").await.json();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].id, "proj-1");
    }

    #[tokio::test]
    async fn syncs_every_pending_project() {
        let (server, _) = setup();
        create_project(&server, "local-1").await;
        create_project(&server, "local-2").await;

        let response = server.post("/api/v1/sync").await;

        response.assert_status_ok();
        let reports: Vec<Value> = response.json();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r["outcome"] == "synced"));

        let again: Vec<Value> = server.post("/api/v1/sync").await.json();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn returns_not_found_for_an_unknown_project() {
        let (server, _) = setup();

        server
            .post("/api/v1/projects/missing/sync")
            .await
            .assert_status_not_found();
    }
}
