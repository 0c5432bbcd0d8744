use actix_web::http::StatusCode;
use actix_web::test;
use actix_web::test::TestRequest;
use actix_web::App;
use expense_repo::tag_repo::Tag;
use rstest::rstest;
use serde_json::{json, Value};
use tracing::instrument;

use utils::build_repos;
use utils::tracing_setup;
use utils::MultipartBody;

#[macro_use]
mod utils;

#[instrument]
#[rstest]
#[actix_rt::test]
async fn test_tag_crud(_tracing_setup: &()) {
    let repos = build_repos().await;
    let service = test::init_service(build_app!(repos.repos())).await;

    let groceries = create_tag!(&service, "Groceries");
    let bills = create_tag!(&service, "Bills");
    assert_eq!(groceries.color, "#336699");

    let request = TestRequest::get().uri("/api/tags").to_request();
    let tags: Vec<Tag> = test::call_and_read_body_json(&service, request).await;
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Bills", "Groceries"]);

    let request = TestRequest::put()
        .uri(format!("/api/tags/{}", bills.id).as_str())
        .set_json(json!({"name": "Utilities", "color": "#ff0000"}))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Tag = test::read_body_json(response).await;
    assert_eq!(updated.id, bills.id);
    assert_eq!(updated.name, "Utilities");
    assert_eq!(updated.color, "#ff0000");

    let request = TestRequest::get()
        .uri(format!("/api/tags/{}", bills.id).as_str())
        .to_request();
    let fetched: Tag = test::call_and_read_body_json(&service, request).await;
    assert_eq!(fetched, updated);

    let request = TestRequest::delete()
        .uri(format!("/api/tags/{}", groceries.id).as_str())
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = TestRequest::get()
        .uri(format!("/api/tags/{}", groceries.id).as_str())
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: Value = test::read_body_json(response).await;
    assert_eq!(
        error["error"],
        format!("Tag with id {} not found", groceries.id)
    );

    let request = TestRequest::delete()
        .uri(format!("/api/tags/{}", groceries.id).as_str())
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[case::empty_name(r##"{"name": "", "color": "#000000"}"##)]
#[case::missing_color(r#"{"name": "Food"}"#)]
#[case::malformed(r#"{"name": "Food", "#)]
#[actix_rt::test]
async fn test_create_invalid_tag(_tracing_setup: &(), #[case] body: &str) {
    let repos = build_repos().await;
    let service = test::init_service(build_app!(repos.repos())).await;

    let request = TestRequest::post()
        .uri("/api/tags")
        .insert_header(("content-type", "application/json"))
        .set_payload(body.to_string())
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = test::read_body_json(response).await;
    assert!(error["error"].is_string());
    assert!(error["details"].is_string());
}

#[instrument]
#[rstest]
#[actix_rt::test]
async fn test_tag_stats(_tracing_setup: &()) {
    let repos = build_repos().await;
    let service = test::init_service(build_app!(repos.repos())).await;
    let bills = create_tag!(&service, "Bills");
    let unused = create_tag!(&service, "Unused");

    for amount in ["10.00", "5.25"] {
        let request = TestRequest::post()
            .uri("/api/payments")
            .set_json(json!({
                "info": "Water",
                "amount": amount,
                "datePaid": "2024-03-01",
                "tags": [bills.id],
            }))
            .to_request();
        let response = test::call_service(&service, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let request = MultipartBody::new()
        .text("title", "Water contract")
        .text("tags", &bills.id)
        .file("file", "water.pdf", b"pdf")
        .attach(TestRequest::post().uri("/api/documents"))
        .to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let request = TestRequest::get().uri("/api/tags/stats").to_request();
    let stats: Vec<Value> = test::call_and_read_body_json(&service, request).await;
    assert_eq!(stats.len(), 2);

    let bills_stats = stats.iter().find(|s| s["id"] == bills.id.as_str()).unwrap();
    assert_eq!(bills_stats["payment_count"], 2);
    assert_eq!(bills_stats["document_count"], 1);
    assert_eq!(bills_stats["total_amount"], 15.25);

    let unused_stats = stats.iter().find(|s| s["id"] == unused.id.as_str()).unwrap();
    assert_eq!(unused_stats["payment_count"], 0);
    assert_eq!(unused_stats["document_count"], 0);
    assert_eq!(unused_stats["total_amount"], 0.0);
}

#[instrument]
#[rstest]
#[actix_rt::test]
async fn test_health(_tracing_setup: &()) {
    let repos = build_repos().await;
    let service = test::init_service(build_app!(repos.repos())).await;

    let request = TestRequest::get().uri("/api/health").to_request();
    let response = test::call_service(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body, json!({"status": "ok"}));
}
