use crate::repositories;
use crate::test_support;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn teacher_builds_exam_with_questions() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(json!({"title": "  Physics midterm  "})),
        ))
        .await
        .expect("create exam");

    let status = response.status();
    let exam = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {exam}");
    assert_eq!(exam["title"], "Physics midterm");
    assert_eq!(exam["created_by"], teacher.id);
    let exam_id = exam["id"].as_str().expect("exam id").to_string();

    for (text, answers) in [
        ("What is force?", json!(["Mass times acceleration", "  ", "F = ma"])),
        ("What is energy?", json!(["The capacity to do work"])),
    ] {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/exams/{exam_id}/questions"),
                Some(&token),
                Some(json!({"text": text, "expected_answers": answers})),
            ))
            .await
            .expect("add question");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/exams/{exam_id}/questions"),
            Some(&token),
            None,
        ))
        .await
        .expect("list questions");

    let status = response.status();
    let questions = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {questions}");
    let questions = questions.as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["text"], "What is force?");
    assert_eq!(questions[0]["order_index"], 1);
    assert_eq!(questions[0]["expected_answers"].as_array().expect("answers").len(), 2);
    assert_eq!(questions[1]["order_index"], 2);
}

#[tokio::test]
async fn question_requires_an_expected_answer() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let (exam, _) = test_support::insert_exam(ctx.state.db(), &teacher.id, "Quiz", &[]).await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/questions", exam.id),
            Some(&token),
            Some(json!({"text": "What is mass?", "expected_answers": ["   "]})),
        ))
        .await
        .expect("add question");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn teachers_only_see_and_edit_their_own_exams() {
    let ctx = test_support::setup_test_context().await;

    let owner = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let other = test_support::insert_teacher(ctx.state.db(), "t2").await;
    let (exam, _) = test_support::insert_exam(
        ctx.state.db(),
        &owner.id,
        "Chemistry",
        &[("What is an atom?", &["The smallest unit of matter"])],
    )
    .await;
    test_support::insert_exam(ctx.state.db(), &other.id, "Biology", &[]).await;

    let other_token = test_support::bearer_token(&other.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/exams", Some(&other_token), None))
        .await
        .expect("list exams");
    let listed = test_support::read_json(response).await;
    let listed = listed.as_array().expect("exams");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["title"], "Biology");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/exams/{}", exam.id),
            Some(&other_token),
            Some(json!({"title": "Hijacked"})),
        ))
        .await
        .expect("rename exam");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/exams/{}", exam.id),
            Some(&other_token),
            None,
        ))
        .await
        .expect("delete exam");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let owner_token = test_support::bearer_token(&owner.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/exams/{}", exam.id),
            Some(&owner_token),
            Some(json!({"title": "Chemistry final"})),
        ))
        .await
        .expect("rename exam");
    let status = response.status();
    let renamed = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {renamed}");
    assert_eq!(renamed["title"], "Chemistry final");
}

#[tokio::test]
async fn students_cannot_author_exams() {
    let ctx = test_support::setup_test_context().await;

    let student = test_support::insert_student(ctx.state.db(), "s1").await;
    let token = test_support::bearer_token(&student.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams",
            Some(&token),
            Some(json!({"title": "Sneaky"})),
        ))
        .await
        .expect("create exam");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_exam_and_question_cascades() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let (exam, questions) = test_support::insert_exam(
        ctx.state.db(),
        &teacher.id,
        "History",
        &[("When did WW2 end?", &["1945"]), ("Who was Napoleon?", &["A French emperor"])],
    )
    .await;
    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/exams/{}/questions/{}", exam.id, questions[0].id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete question");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let remaining =
        repositories::questions::list_by_exam(ctx.state.db(), &exam.id).await.expect("questions");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, questions[1].id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/exams/{}", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete exam");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let gone = repositories::exams::find_by_id(ctx.state.db(), &exam.id).await.expect("find");
    assert!(gone.is_none());
    let orphaned =
        repositories::questions::list_by_exam(ctx.state.db(), &exam.id).await.expect("questions");
    assert!(orphaned.is_empty());
}

#[tokio::test]
async fn exam_scores_list_each_student() {
    let ctx = test_support::setup_test_context().await;

    let teacher = test_support::insert_teacher(ctx.state.db(), "t1").await;
    let (exam, questions) = test_support::insert_exam(
        ctx.state.db(),
        &teacher.id,
        "Physics",
        &[("What is force?", &["Mass times acceleration"])],
    )
    .await;

    for name in ["s1", "s2"] {
        let student = test_support::insert_student(ctx.state.db(), name).await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/student/exams/{}/answers", exam.id),
                Some(&token),
                Some(json!({"answers": [
                    {"question_id": questions[0].id, "answer": "mass times acceleration"}
                ]})),
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let token = test_support::bearer_token(&teacher.id, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/exams/{}/scores", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("exam scores");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let groups = body.as_array().expect("groups");
    assert_eq!(groups.len(), 2);
    for group in groups {
        assert_eq!(group["exam_id"], exam.id);
        assert_eq!(group["max_score"], 10.0);
    }

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/v1/exams/scores",
            Some(&token),
            None,
        ))
        .await
        .expect("all scores");
    let body = test_support::read_json(response).await;
    assert_eq!(body.as_array().expect("groups").len(), 2);
}
