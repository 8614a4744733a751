use crate::repositories;
use crate::test_support;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn admin_can_create_and_update_user() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/users",
            Some(&token),
            Some(json!({
                "username": "alice",
                "full_name": "Alice Smith",
                "password": "student-pass"
            })),
        ))
        .await
        .expect("create user");

    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let user_id = created["id"].as_str().expect("user id").to_string();
    assert_eq!(created["username"], "alice");
    assert_eq!(created["role"], "student");
    assert_eq!(created["is_active"], true);
    assert!(created.get("hashed_password").is_none());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/users/{user_id}"),
            Some(&token),
            Some(json!({"full_name": "Alice Jones", "is_active": false})),
        ))
        .await
        .expect("update user");

    let status = response.status();
    let updated = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["full_name"], "Alice Jones");
    assert_eq!(updated["is_active"], false);

    let stored = repositories::users::find_by_id(ctx.state.db(), &user_id)
        .await
        .expect("find user")
        .expect("user exists");
    assert!(!stored.is_active);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin").await;
    test_support::insert_teacher(ctx.state.db(), "bob").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/users",
            Some(&token),
            Some(json!({
                "username": "bob",
                "full_name": "Another Bob",
                "password": "another-pass",
                "role": "teacher"
            })),
        ))
        .await
        .expect("create duplicate");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
}

#[tokio::test]
async fn short_password_is_rejected() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/users",
            Some(&token),
            Some(json!({"username": "carol", "full_name": "Carol", "password": "short"})),
        ))
        .await
        .expect("create user");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_role() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin").await;
    test_support::insert_teacher(ctx.state.db(), "t1").await;
    for name in ["s1", "s2"] {
        test_support::insert_student(ctx.state.db(), name).await;
    }
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/users?role=student&limit=1",
            Some(&token),
            None,
        ))
        .await
        .expect("list users");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"].as_array().expect("items").len(), 1);
    assert_eq!(body["items"][0]["role"], "student");
}

#[tokio::test]
async fn non_admins_cannot_manage_users() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/users", Some(&token), None))
        .await
        .expect("list users");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_cannot_delete_self_but_can_delete_others() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin").await;
    let student = test_support::insert_student(ctx.state.db(), "s1").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/users/{}", admin.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete self");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/users/{}", student.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete student");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let gone = repositories::users::find_by_id(ctx.state.db(), &student.id).await.expect("find");
    assert!(gone.is_none());
}

#[tokio::test]
async fn student_scores_are_grouped_by_exam() {
    let ctx = test_support::setup_test_context().await;

    let admin = test_support::insert_admin(ctx.state.db(), "admin").await;
    let teacher = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let student = test_support::insert_student(ctx.state.db(), "s1").await;
    let (exam, questions) = test_support::insert_exam(
        ctx.state.db(),
        &teacher.id,
        "Physics",
        &[("What is force?", &["Mass times acceleration"])],
    )
    .await;

    let student_token = test_support::bearer_token(&student.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/student/exams/{}/answers", exam.id),
            Some(&student_token),
            Some(json!({"answers": [
                {"question_id": questions[0].id, "answer": "Mass times acceleration"}
            ]})),
        ))
        .await
        .expect("submit answers");
    assert_eq!(response.status(), StatusCode::CREATED);

    let token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/users/{}/scores", student.id),
            Some(&token),
            None,
        ))
        .await
        .expect("user scores");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let groups = body.as_array().expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["exam_title"], "Physics");
    assert_eq!(groups[0]["max_score"], 10.0);
    assert_eq!(groups[0]["answers"].as_array().expect("answers").len(), 1);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/users/{}/scores", teacher.id),
            Some(&token),
            None,
        ))
        .await
        .expect("teacher scores");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
