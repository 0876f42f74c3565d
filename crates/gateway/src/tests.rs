//! Router tests against in-memory adapters

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use paperledger_common::billing::SimulatedPayment;
use paperledger_common::ledger::MemoryLedger;
use paperledger_common::llm::TemplateResponder;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "paperledger-test-boundary";

struct Harness {
    app: Router,
    ledger: MemoryLedger,
    blobs: MemoryBlobStore,
    registry: Option<String>,
}

async fn harness_with(config: AppConfig, with_ledger: bool) -> Harness {
    let blob_limit = config.server.max_upload_bytes;
    harness_with_blob_limit(config, blob_limit, with_ledger).await
}

async fn harness_with_blob_limit(config: AppConfig, blob_limit: usize, with_ledger: bool) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let blobs = MemoryBlobStore::new(blob_limit);
    let ledger = MemoryLedger::new("0.0.2");

    let registry = if with_ledger {
        ledger::bootstrap(&ledger, &config.ledger)
            .await
            .unwrap()
            .registry_topic
    } else {
        None
    };

    let state = AppState {
        config: Arc::new(config),
        papers: store.clone(),
        sessions: store,
        blobs: Arc::new(blobs.clone()),
        ledger: with_ledger.then(|| Arc::new(ledger.clone()) as Arc<dyn Ledger>),
        registry_topic: registry.clone(),
        chat_model: Arc::new(TemplateResponder::new()),
        payments: Arc::new(SimulatedPayment),
    };

    Harness {
        app: create_router(state),
        ledger,
        blobs,
        registry,
    }
}

async fn harness() -> Harness {
    harness_with(AppConfig::default(), true).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn paper_body(id: &str, title: &str, fee: f64) -> Value {
    json!({
        "paperId": id,
        "title": title,
        "authors": ["A", "B"],
        "abstract": "x",
        "publisherId": "pub1",
        "fee": fee,
    })
}

async fn create(app: &Router, id: &str, title: &str, fee: f64) -> (StatusCode, Value) {
    send(app, json_request(Method::POST, "/api/papers", paper_body(id, title, fee))).await
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, media_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, media_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/papers/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn upload_fields(id: &str) -> Vec<(&str, &str)> {
    vec![
        ("paperId", id),
        ("title", "Streaming uploads"),
        ("authors", r#"["Ada", "Grace"]"#),
        ("abstract", "Bytes go straight to the bucket."),
        ("keywords", "storage, streaming"),
        ("publisherId", "pub1"),
        ("fee", "2.5"),
    ]
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["message"].is_string());

    let (status, body) = send(&h.app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}

#[tokio::test]
async fn test_create_then_fetch() {
    let h = harness().await;
    let (status, created) = create(&h.app, "p1", "Test", 5.0).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["paperId"], "p1");

    let (status, paper) = send(&h.app, get("/api/papers/p1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paper["title"], "Test");
    assert_eq!(paper["authors"], json!(["A", "B"]));
    assert_eq!(paper["abstract"], "x");
    assert_eq!(paper["fee"], 5.0);
}

#[tokio::test]
async fn test_missing_title_persists_nothing() {
    let h = harness().await;
    let mut body = paper_body("p1", "Test", 5.0);
    body.as_object_mut().unwrap().remove("title");

    let (status, err) = send(&h.app, json_request(Method::POST, "/api/papers", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "MISSING_FIELD");
    assert_eq!(err["error"]["field"], "title");

    let (_, list) = send(&h.app, get("/api/papers")).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_malformed_json_is_client_error() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/papers")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, err) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_negative_fee_rejected() {
    let h = harness().await;
    let (status, _) = create(&h.app, "p1", "Test", -1.0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_id_conflicts() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;
    let (status, err) = create(&h.app, "p1", "Other", 1.0).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "DUPLICATE_PAPER");
}

#[tokio::test]
async fn test_listing_and_search() {
    let h = harness().await;
    create(&h.app, "p1", "Consensus protocols", 5.0).await;
    create(&h.app, "p2", "Vector search", 1.0).await;

    let (status, list) = send(&h.app, get("/api/papers")).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().all(|p| p.get("contentId").is_none()));

    let (_, hits) = send(&h.app, get("/api/papers?q=consensus")).await;
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["paperId"], "p1");

    let (status, hits) = send(&h.app, get("/api/papers?q=photosynthesis")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits, json!([]));
}

#[tokio::test]
async fn test_unknown_paper_is_404() {
    let h = harness().await;
    let (status, err) = send(&h.app, get("/api/papers/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "PAPER_NOT_FOUND");
}

#[tokio::test]
async fn test_sequential_fetches_count_twice() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;

    send(&h.app, get("/api/papers/p1")).await;
    let (_, paper) = send(&h.app, get("/api/papers/p1")).await;
    assert_eq!(paper["accessCount"], 2);
}

#[tokio::test]
async fn test_create_fetch_chat_scenario() {
    let h = harness().await;
    let (status, _) = create(&h.app, "p1", "Test", 5.0).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, paper) = send(&h.app, get("/api/papers/p1")).await;
    assert_eq!(paper["fee"], 5.0);

    let (status, chat) = send(
        &h.app,
        json_request(Method::POST, "/api/chat", json!({ "message": "Test" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!chat["reply"].as_str().unwrap().is_empty());
    assert_eq!(chat["papers"][0]["paperId"], "p1");
    assert_eq!(chat["papers"][0]["authors"], json!(["A", "B"]));
}

#[tokio::test]
async fn test_chat_without_matches() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;

    let (status, chat) = send(
        &h.app,
        json_request(Method::POST, "/api/chat", json!({ "message": "photosynthesis" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!chat["reply"].as_str().unwrap().is_empty());
    assert_eq!(chat["papers"], json!([]));
}

#[tokio::test]
async fn test_chat_blank_message() {
    let h = harness().await;
    let (status, err) = send(
        &h.app,
        json_request(Method::POST, "/api/chat", json!({ "message": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["field"], "message");
}

#[tokio::test]
async fn test_chat_records_to_session() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;
    let (_, session) = send(&h.app, json_request(Method::POST, "/api/sessions", json!({}))).await;
    let id = session["id"].as_str().unwrap().to_string();

    send(
        &h.app,
        json_request(
            Method::POST,
            "/api/chat",
            json!({ "message": "Test", "sessionId": id }),
        ),
    )
    .await;

    let (_, session) = send(&h.app, get(&format!("/api/sessions/{}", id))).await;
    assert_eq!(session["messages"].as_array().unwrap().len(), 2);
    assert_eq!(session["messages"][0]["role"], "user");
    assert_eq!(session["relatedPapers"][0]["paperId"], "p1");
    assert_eq!(session["stage"], "papers_selected");
}

#[tokio::test]
async fn test_upload_stores_blob_and_announces() {
    let h = harness().await;
    let fields = upload_fields("u1");
    let (status, body) = send(
        &h.app,
        multipart(&fields, Some(("notes.txt", "text/plain", b"hello ledger"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["paperId"], "u1");
    assert!(body.get("paper").is_none());
    assert_eq!(body["authors"], json!(["Ada", "Grace"]));
    assert_eq!(body["keywords"], json!(["storage", "streaming"]));
    assert_eq!(body["fee"], 2.5);
    assert!(body["topicId"].is_string());
    assert_eq!(body["file"]["size"], 12);
    assert_eq!(body["registrySequence"], 1);

    let registry = h.registry.unwrap();
    let messages = h.ledger.messages(&registry).await;
    let announced: Value = serde_json::from_slice(&messages[0]).unwrap();
    assert_eq!(announced["paperId"], "u1");
    assert_eq!(announced["contentId"], body["contentId"]);

    let response = h.app.clone().oneshot(get("/api/papers/u1/content")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello ledger");
}

#[tokio::test]
async fn test_upload_over_ceiling_leaves_nothing() {
    let mut config = AppConfig::default();
    config.server.max_upload_bytes = 16;
    let h = harness_with(config, true).await;

    let big = vec![b'x'; 64];
    let fields = upload_fields("big");
    let (status, err) = send(&h.app, multipart(&fields, Some(("big.txt", "text/plain", &big)))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(err["error"]["code"], "PAYLOAD_TOO_LARGE");

    let (status, _) = send(&h.app, get("/api/papers/big")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.blobs.is_empty().await);
}

#[tokio::test]
async fn test_upload_over_body_limit_leaves_nothing() {
    let mut config = AppConfig::default();
    config.server.max_upload_bytes = 16;
    // Blob store accepts far more, so only the request body limit can trip
    let h = harness_with_blob_limit(config, 1024 * 1024, true).await;

    let big = vec![b'x'; MULTIPART_OVERHEAD + 1024];
    let fields = upload_fields("huge");
    let (status, _) = send(&h.app, multipart(&fields, Some(("huge.txt", "text/plain", &big)))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = send(&h.app, get("/api/papers/huge")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.blobs.is_empty().await);
}

#[tokio::test]
async fn test_upload_rejects_unlisted_media_type() {
    let h = harness().await;
    let fields = upload_fields("img");
    let (status, _) = send(&h.app, multipart(&fields, Some(("x.png", "image/png", b"\x89PNG")))).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(h.blobs.is_empty().await);
}

#[tokio::test]
async fn test_upload_without_ledger_is_unavailable() {
    let h = harness_with(AppConfig::default(), false).await;
    let fields = upload_fields("u1");
    let (status, err) = send(&h.app, multipart(&fields, Some(("a.txt", "text/plain", b"data")))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err["error"]["code"], "LEDGER_UNAVAILABLE");
    assert!(h.blobs.is_empty().await);
}

#[tokio::test]
async fn test_upload_missing_metadata() {
    let h = harness().await;
    let (status, err) = send(
        &h.app,
        multipart(&[("paperId", "u1")], Some(("a.txt", "text/plain", b"data"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "MISSING_FIELD");
    assert!(h.blobs.is_empty().await);

    let fields = upload_fields("u2");
    let (status, err) = send(&h.app, multipart(&fields, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["field"], "file");
}

#[tokio::test]
async fn test_upload_duplicate_id_keeps_no_blob() {
    let h = harness().await;
    create(&h.app, "dup", "Existing", 1.0).await;

    let fields = upload_fields("dup");
    let (status, _) = send(&h.app, multipart(&fields, Some(("a.txt", "text/plain", b"data")))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(h.blobs.is_empty().await);
}

#[tokio::test]
async fn test_content_of_metadata_only_paper_is_404() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;
    let (status, err) = send(&h.app, get("/api/papers/p1/content")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "CONTENT_NOT_FOUND");
}

#[tokio::test]
async fn test_quote_and_pay_flow() {
    let h = harness().await;
    let (status, session) = send(&h.app, json_request(Method::POST, "/api/sessions", json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["stage"], "idle");
    let id = session["id"].as_str().unwrap().to_string();

    create(&h.app, "a", "A", 5.0).await;
    create(&h.app, "b", "B", 10.0).await;

    // Pay before quote
    let (status, err) = send(
        &h.app,
        json_request(Method::POST, &format!("/api/sessions/{}/pay", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "INVALID_SESSION_STATE");

    let (status, _) = send(
        &h.app,
        json_request(
            Method::PUT,
            &format!("/api/sessions/{}", id),
            json!({
                "relatedPapers": [
                    { "paperId": "a", "title": "A", "fee": 5.0, "contentId": null },
                    { "paperId": "b", "title": "B", "fee": 10.0, "contentId": null }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, quoted) = send(
        &h.app,
        json_request(Method::POST, &format!("/api/sessions/{}/quote", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quoted["quote"]["papersCost"], 15.0);
    assert_eq!(quoted["quote"]["platformFee"], 0.75);
    assert_eq!(quoted["quote"]["total"], 15.75);
    assert_eq!(quoted["stage"], "quoted");

    let (status, paid) = send(
        &h.app,
        json_request(Method::POST, &format!("/api/sessions/{}/pay", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["paymentStatus"], "paid");
    assert_eq!(paid["payment"]["simulated"], true);
    assert_eq!(paid["payment"]["paperIds"], json!(["a", "b"]));

    let (status, _) = send(
        &h.app,
        json_request(Method::POST, &format!("/api/sessions/{}/pay", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

async fn new_session(app: &Router) -> String {
    let (_, session) = send(app, json_request(Method::POST, "/api/sessions", json!({}))).await;
    session["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_quote_prices_from_catalogue() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;
    let id = new_session(&h.app).await;

    // Client-supplied title and fee are replaced by the stored paper
    let (status, session) = send(
        &h.app,
        json_request(
            Method::PUT,
            &format!("/api/sessions/{}", id),
            json!({ "relatedPapers": [{ "paperId": "p1", "title": "Cheap", "fee": 0.0, "contentId": null }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["relatedPapers"][0]["fee"], 5.0);
    assert_eq!(session["relatedPapers"][0]["title"], "Test");

    let (status, quoted) = send(
        &h.app,
        json_request(Method::POST, &format!("/api/sessions/{}/quote", id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quoted["quote"]["papersCost"], 5.0);
    assert_eq!(quoted["quote"]["total"], 5.25);

    // An id outside the catalogue cannot be selected
    let (status, err) = send(
        &h.app,
        json_request(
            Method::PUT,
            &format!("/api/sessions/{}", id),
            json!({ "relatedPapers": [
                { "paperId": "p1", "title": "Test", "fee": 5.0, "contentId": null },
                { "paperId": "ghost", "title": "Ghost", "fee": 0.0, "contentId": null }
            ] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "PAPER_NOT_FOUND");

    let (_, session) = send(&h.app, get(&format!("/api/sessions/{}", id))).await;
    assert_eq!(session["relatedPapers"].as_array().unwrap().len(), 1);
    assert_eq!(session["stage"], "quoted");
}

#[tokio::test]
async fn test_paid_session_keeps_receipt() {
    let h = harness().await;
    create(&h.app, "p1", "Test", 5.0).await;
    create(&h.app, "p2", "Other", 1.0).await;
    let id = new_session(&h.app).await;

    let chat = |message: &str| {
        json_request(
            Method::POST,
            "/api/chat",
            json!({ "message": message, "sessionId": id }),
        )
    };
    send(&h.app, chat("Test")).await;
    send(&h.app, json_request(Method::POST, &format!("/api/sessions/{}/quote", id), json!({}))).await;
    let (status, _) = send(&h.app, json_request(Method::POST, &format!("/api/sessions/{}/pay", id), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    // Chat still answers but leaves the paid selection alone
    let (status, reply) = send(&h.app, chat("Test again")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["papers"][0]["paperId"], "p1");

    let (_, session) = send(&h.app, get(&format!("/api/sessions/{}", id))).await;
    assert_eq!(session["paymentStatus"], "paid");
    assert_eq!(session["stage"], "paid");
    assert_eq!(session["payment"]["paperIds"], json!(["p1"]));
    assert_eq!(session["messages"].as_array().unwrap().len(), 4);

    let (status, err) = send(
        &h.app,
        json_request(
            Method::PUT,
            &format!("/api/sessions/{}", id),
            json!({ "relatedPapers": [{ "paperId": "p2", "title": "Other", "fee": 1.0, "contentId": null }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "INVALID_SESSION_STATE");

    let (status, _) = send(&h.app, json_request(Method::POST, &format!("/api/sessions/{}/quote", id), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, session) = send(&h.app, get(&format!("/api/sessions/{}", id))).await;
    assert!(!session["payment"].is_null());
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let h = harness().await;
    let (status, err) = send(
        &h.app,
        get("/api/sessions/00000000-0000-0000-0000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_production_mode_redacts_server_errors() {
    let mut config = AppConfig::default();
    config.server.production = true;
    let h = harness_with(config, false).await;

    let fields = upload_fields("u1");
    let (status, err) = send(&h.app, multipart(&fields, Some(("a.txt", "text/plain", b"data")))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err["error"]["code"], "LEDGER_UNAVAILABLE");
    assert_eq!(err["error"]["message"], "Service temporarily unavailable");

    // Client errors keep their message
    let (_, err) = send(
        &h.app,
        json_request(Method::POST, "/api/chat", json!({ "message": "" })),
    )
    .await;
    assert!(err["error"]["message"].as_str().unwrap().contains("message"));
}

#[test]
fn test_upstream_histograms_use_wide_buckets() {
    let recorder = prometheus_builder().unwrap().build_recorder();
    let handle = recorder.handle();
    ::metrics::with_local_recorder(&recorder, || {
        paperledger_common::metrics::record_llm(12.0, "template", true);
        paperledger_common::metrics::record_ledger(0.2, "create_topic", true);
        paperledger_common::metrics::RequestMetrics::start("GET", "/api/papers").finish(200);
    });

    let rendered = handle.render();
    let buckets = |name: &str| -> Vec<String> {
        let prefix = format!("{}_bucket", name);
        rendered
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .map(str::to_string)
            .collect()
    };

    let [llm, ledger] = paperledger_common::metrics::upstream_histograms();
    assert!(buckets(&llm).iter().any(|l| l.contains("le=\"30")));
    assert!(buckets(&ledger).iter().any(|l| l.contains("le=\"30")));

    let requests = buckets("paperledger_request_duration_seconds");
    assert!(requests.iter().any(|l| l.contains("le=\"0.001\"")));
    assert!(!requests.iter().any(|l| l.contains("le=\"30")));
}
