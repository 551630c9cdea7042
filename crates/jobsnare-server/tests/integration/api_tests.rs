use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::integration::common::{JOB_PAGE, TestApp, setup_test_app, setup_test_app_with_limit};

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn mount_job_page(app: &TestApp, job_path: &str) {
    Mock::given(method("GET"))
        .and(path(job_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(JOB_PAGE))
        .mount(&app.board)
        .await;
}

async fn mount_server_error(app: &TestApp, job_path: &str) {
    Mock::given(method("GET"))
        .and(path(job_path))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.board)
        .await;
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["services"]["http"], true);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"]["/v1/jobs/parse"].is_object());
}

#[tokio::test]
async fn parse_returns_job() {
    let app = setup_test_app().await;
    mount_job_page(&app, "/jobs/42").await;
    let url = app.job_url("/jobs/42");

    let response = app
        .router
        .clone()
        .oneshot(post_json("/v1/jobs/parse", serde_json::json!({ "url": url })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["job"]["title"], "Site Reliability Engineer");
    assert_eq!(json["job"]["company"], "Acme");
    assert_eq!(json["job"]["description"], "Keep the fleet healthy.");
    assert_eq!(json["job"]["source"], "Acme Careers");
    assert_eq!(json["job"]["applyUrl"], url.as_str());
    assert!(json.get("debug").is_none());
}

#[tokio::test]
async fn parse_with_debug_reports_coverage() {
    let app = setup_test_app().await;
    mount_job_page(&app, "/jobs/7").await;
    let url = app.job_url("/jobs/7");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/v1/jobs/parse")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::from(
                    serde_json::json!({ "url": url, "debug": true }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let debug = &json["debug"];
    assert_eq!(debug["success"], true);
    assert_eq!(debug["successScore"], "3/4");
    assert_eq!(debug["missingFields"], serde_json::json!(["location"]));
    assert_eq!(debug["domain"], "careers.acme.test");
    assert_eq!(debug["clientId"], "203.0.113.7");
    assert_eq!(debug["scraping"]["attempts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn parse_degrades_to_minimal_job_when_every_strategy_fails() {
    let app = setup_test_app().await;
    mount_server_error(&app, "/jobs/gone").await;
    let url = app.job_url("/jobs/gone");

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/v1/jobs/parse",
            serde_json::json!({ "url": url, "debug": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["job"]["applyUrl"], url.as_str());
    assert_eq!(json["job"]["source"], "careers.acme.test");
    assert!(json["job"].get("title").is_none() || json["job"]["title"].is_null());
    assert_eq!(json["debug"]["success"], false);
    assert_eq!(json["debug"]["successScore"], "0/4");
    assert_eq!(
        json["debug"]["scraping"]["attempts"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn invalid_url_returns_400() {
    let app = setup_test_app().await;

    for url in ["ftp://careers.acme.test/jobs/1", "not a url", "http://127.0.0.1/jobs/1"] {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/v1/jobs/parse", serde_json::json!({ "url": url })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{url}");
        let json = json_body(response).await;
        assert_eq!(json["error"], "Invalid URL");
    }
}

#[tokio::test]
async fn rate_limit_returns_429_per_client() {
    let app = setup_test_app_with_limit(2).await;
    let request = |client: &str| {
        Request::post("/v1/jobs/parse")
            .header("content-type", "application/json")
            .header("x-forwarded-for", client)
            .body(Body::from(r#"{"url":"ftp://nowhere"}"#))
            .unwrap()
    };

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(request("203.0.113.7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .router
        .clone()
        .oneshot(request("203.0.113.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Rate limit exceeded. Please try again later.");
    assert_eq!(json["rateLimited"], true);

    let response = app
        .router
        .clone()
        .oneshot(request("198.51.100.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let app = setup_test_app_with_limit(1).await;

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_endpoint_without_url_returns_usage() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/v1/jobs/parse/test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["usage"].as_str().unwrap().contains("?url="));
    assert!(!json["testUrls"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_endpoint_reports_metrics() {
    let app = setup_test_app().await;
    mount_job_page(&app, "/jobs/9").await;
    let url = app.job_url("/jobs/9");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/v1/jobs/parse/test?url={url}&verbose=true"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["successScore"], "3/4");
    assert_eq!(
        json["filledFields"],
        serde_json::json!(["title", "company", "description"])
    );
    assert_eq!(json["domainInfo"]["domainPattern"], "default");
    assert_eq!(json["job"]["hasDescription"], true);
    assert_eq!(json["fullJob"]["company"], "Acme");
    assert!(json["debug"]["attempts"].is_array());
}

#[tokio::test]
async fn batch_rejects_empty_and_oversized_lists() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/v1/jobs/parse/batch",
            serde_json::json!({ "urls": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Please provide an array of URLs to test");

    let urls: Vec<String> = (0..6).map(|i| app.job_url(&format!("/jobs/{i}"))).collect();
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/v1/jobs/parse/batch",
            serde_json::json!({ "urls": urls }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Maximum 5 URLs allowed for batch testing");
}

#[tokio::test]
async fn batch_summarises_results_in_order() {
    let app = setup_test_app().await;
    mount_job_page(&app, "/jobs/ok").await;
    mount_server_error(&app, "/jobs/broken").await;

    let urls = vec![
        app.job_url("/jobs/ok"),
        "ftp://careers.acme.test/jobs/x".to_string(),
        app.job_url("/jobs/broken"),
    ];
    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/v1/jobs/parse/batch",
            serde_json::json!({ "urls": urls }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;

    let summary = &json["summary"];
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["successful"], 1);
    assert_eq!(summary["successRate"], "33%");
    assert_eq!(summary["totalAttempts"], 3);

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["url"], urls[0].as_str());
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["service"], "http");
    assert_eq!(results[0]["job"]["title"], "Site Reliability Engineer");
    assert_eq!(results[0]["job"]["hasDescription"], true);

    assert_eq!(results[1]["success"], false);
    assert!(results[1]["error"].as_str().unwrap().contains("Invalid URL"));

    assert_eq!(results[2]["success"], false);
    assert_eq!(results[2]["attempts"], 2);
}
