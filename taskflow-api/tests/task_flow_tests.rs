/// End-to-end tests against a real database
///
/// Require a disposable PostgreSQL database:
///
/// ```bash
/// DATABASE_URL=postgres://localhost/taskflow_test cargo test -p taskflow-api -- --ignored
/// ```

mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, json_request, request, DbContext};
use serde_json::json;
use taskflow_shared::events::TaskEvent;

#[tokio::test]
#[ignore]
async fn test_signup_signin_and_profile() {
    let ctx = DbContext::connect().await.unwrap();
    let (user_id, email, token) = ctx.signup("Ada").await;

    let duplicate = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            json!({ "name": "Ada", "email": email, "password": "Sup3r$ecret" }),
        ))
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let wrong = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": email, "password": "Wr0ng$ecret" }),
        ))
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(wrong).await["message"], "Invalid email or password");

    let signin = ctx
        .send(json_request(
            Method::POST,
            "/api/auth/signin",
            None,
            json!({ "email": email, "password": "Sup3r$ecret" }),
        ))
        .await;
    assert_eq!(signin.status(), StatusCode::OK);

    let check = ctx
        .send(request(Method::GET, &format!("/api/auth/check-email/{}", email), None))
        .await;
    assert_eq!(json_body(check).await["exists"], true);

    let updated = ctx
        .send(json_request(
            Method::PUT,
            "/api/auth/profile",
            Some(&token),
            json!({ "name": "Ada L.", "avatar_url": "https://img.example.com/ada.png" }),
        ))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);

    let me = json_body(ctx.send(request(Method::GET, "/api/auth/me", Some(&token))).await).await;
    assert_eq!(me["id"], user_id.to_string());
    assert_eq!(me["name"], "Ada L.");
    assert_eq!(me["avatar_url"], "https://img.example.com/ada.png");
    assert_eq!(me["has_password"], true);
}

#[tokio::test]
#[ignore]
async fn test_task_lifecycle_with_sharing_and_events() {
    let ctx = DbContext::connect().await.unwrap();
    let (owner_id, _, owner_token) = ctx.signup("Owner").await;
    let (guest_id, guest_email, guest_token) = ctx.signup("Guest").await;

    let mut owner_events = ctx.state.hub.subscribe(owner_id);
    let mut guest_events = ctx.state.hub.subscribe(guest_id);

    // Create
    let created = ctx
        .send(json_request(
            Method::POST,
            "/api/tasks",
            Some(&owner_token),
            json!({ "title": "Plan release", "priority": "high", "dueDate": "2030-01-15" }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let task = json_body(created).await;
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["created_by"]["id"], owner_id.to_string());

    assert!(matches!(owner_events.try_recv(), Ok(TaskEvent::TaskCreated(_))));
    assert!(guest_events.try_recv().is_err());

    // Invisible to the guest until shared
    let hidden = ctx
        .send(request(Method::GET, &format!("/api/tasks/{}", task_id), Some(&guest_token)))
        .await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    // Share
    let share_uri = format!("/api/tasks/{}/share", task_id);
    let shared = ctx
        .send(json_request(Method::POST, &share_uri, Some(&owner_token), json!({ "email": guest_email })))
        .await;
    assert_eq!(shared.status(), StatusCode::OK);
    assert_eq!(json_body(shared).await["shared_with"][0]["id"], guest_id.to_string());

    assert!(matches!(guest_events.try_recv(), Ok(TaskEvent::TaskUpdated(_))));
    assert!(matches!(guest_events.try_recv(), Ok(TaskEvent::TaskShared { .. })));

    let again = ctx
        .send(json_request(Method::POST, &share_uri, Some(&owner_token), json!({ "email": guest_email })))
        .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(again).await["message"], "Task already shared with this user");

    // Only the owner may share
    let by_guest = ctx
        .send(json_request(Method::POST, &share_uri, Some(&guest_token), json!({ "email": guest_email })))
        .await;
    assert_eq!(by_guest.status(), StatusCode::NOT_FOUND);

    // The guest can update, and the owner hears about it
    let _ = owner_events.try_recv();
    let updated = ctx
        .send(json_request(
            Method::PUT,
            &format!("/api/tasks/{}", task_id),
            Some(&guest_token),
            json!({ "status": "in-progress", "description": null }),
        ))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(json_body(updated).await["status"], "in-progress");
    assert!(matches!(owner_events.try_recv(), Ok(TaskEvent::TaskUpdated(_))));

    // Listing and stats see it from both sides
    let listed = json_body(
        ctx.send(request(Method::GET, "/api/tasks?scope=shared&status=in-progress", Some(&guest_token)))
            .await,
    )
    .await;
    assert_eq!(listed["pagination"]["total_tasks"], 1);
    assert_eq!(listed["tasks"][0]["id"], task_id);

    let stats = json_body(ctx.send(request(Method::GET, "/api/tasks/stats", Some(&owner_token))).await).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_status"]["in-progress"], 1);
    assert_eq!(stats["by_priority"]["high"], 1);

    // Only the owner may delete
    let task_uri = format!("/api/tasks/{}", task_id);
    let denied = ctx.send(request(Method::DELETE, &task_uri, Some(&guest_token))).await;
    assert_eq!(denied.status(), StatusCode::NOT_FOUND);

    let _ = guest_events.try_recv();
    let deleted = ctx.send(request(Method::DELETE, &task_uri, Some(&owner_token))).await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(json_body(deleted).await["message"], "Task deleted successfully");
    assert!(matches!(guest_events.try_recv(), Ok(TaskEvent::TaskDeleted { .. })));

    let gone = ctx.send(request(Method::GET, &task_uri, Some(&owner_token))).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_pagination_and_search() {
    let ctx = DbContext::connect().await.unwrap();
    let (_, _, token) = ctx.signup("Pager").await;

    for i in 0..12 {
        let title = if i % 3 == 0 { format!("Invoice 100%_{}", i) } else { format!("Chore {}", i) };
        let response = ctx
            .send(json_request(Method::POST, "/api/tasks", Some(&token), json!({ "title": title })))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let page = json_body(ctx.send(request(Method::GET, "/api/tasks?page=2&limit=5", Some(&token))).await).await;
    assert_eq!(page["tasks"].as_array().unwrap().len(), 5);
    assert_eq!(page["pagination"]["current_page"], 2);
    assert_eq!(page["pagination"]["total_pages"], 3);
    assert_eq!(page["pagination"]["has_next"], true);
    assert_eq!(page["pagination"]["has_prev"], true);

    let found = json_body(
        ctx.send(request(Method::GET, "/api/tasks?search=100%25_&sortBy=title&order=asc", Some(&token)))
            .await,
    )
    .await;
    assert_eq!(found["pagination"]["total_tasks"], 4);
    assert_eq!(found["tasks"][0]["title"], "Invoice 100%_0");
}
