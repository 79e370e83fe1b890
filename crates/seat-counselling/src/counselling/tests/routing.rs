use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::counselling::router::{counselling_router, run_allocation_handler};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn full_round_over_http() {
    let (service, _, _) = build_service();
    let router = counselling_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(empty_request("POST", "/api/v1/counselling/phase/registration"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/counselling/courses",
            json!({
                "id": "x",
                "institution_id": "abc",
                "name": "Computer Science",
                "code": "CSE",
                "capacity": 1
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    for (id, rank) in [("s1", 1), ("s2", 2)] {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/counselling/students",
                json!({ "id": id, "name": id, "rank": rank, "category": "GENERAL" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/counselling/students/{id}/payment"),
                json!({ "method": "upi" }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload.get("status"), Some(&json!("completed")));
    }

    let response = router
        .clone()
        .oneshot(empty_request("POST", "/api/v1/counselling/phase/preferences"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    for id in ["s1", "s2"] {
        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/counselling/students/{id}/preferences"),
                json!({ "course_ids": ["x"] }),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(empty_request("POST", "/api/v1/counselling/allocation/run"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("allocated_count"), Some(&json!(1)));
    assert_eq!(payload.get("unallocated_student_ids"), Some(&json!(["s2"])));

    let response = router
        .clone()
        .oneshot(empty_request("GET", "/api/v1/counselling/students/s1"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.pointer("/allocation/course_id"),
        Some(&json!("x"))
    );

    let response = router
        .clone()
        .oneshot(empty_request("GET", "/api/v1/counselling/allocations.csv"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"text/csv"[..])
    );
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(body.to_vec()).expect("utf8");
    assert!(text.lines().nth(1).unwrap_or_default().starts_with("s1,1,x,abc,1,"));
}

#[tokio::test]
async fn run_outside_preference_phase_is_a_conflict() {
    let (service, _, _) = build_service();

    let response = run_allocation_handler(State(Arc::new(service))).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("kind"), Some(&json!("phase")));
}

#[tokio::test]
async fn validation_failures_are_unprocessable() {
    let (service, _, _) = build_service();
    contested_round(&service);
    let router = counselling_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "PUT",
            "/api/v1/counselling/students/s1/preferences",
            json!({ "course_ids": ["x", "x"] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("kind"), Some(&json!("validation")));
}

#[tokio::test]
async fn statistics_and_reset_round_trip() {
    let (service, _, _) = build_service();
    contested_round(&service);
    let router = counselling_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(empty_request("POST", "/api/v1/counselling/reset"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(empty_request("GET", "/api/v1/counselling/statistics"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("paid_count"), Some(&json!(0)));
    assert_eq!(payload.get("phase"), Some(&json!("setup")));
    assert_eq!(payload.get("total_students"), Some(&json!(3)));
}

#[tokio::test]
async fn unavailable_store_maps_to_service_unavailable() {
    let (service, _, _) = build_service_with(Arc::new(FailingCommitRepository::default()));
    contested_round(&service);

    let response = run_allocation_handler(State(Arc::new(service))).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
