use gateway::api::{
    BusyIndicator, ErrorSink, PipelineContext, QueryParams, RequestBody, RequestOptions, RequestPipeline, ResponseBody,
};
use gateway::error::{ErrorKind, GatewayError, RequestError};
use mockito::{Matcher, Server, ServerGuard};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink(Mutex<Vec<RequestError>>);

impl ErrorSink for RecordingSink {
    fn report(&self, error: &RequestError) {
        self.0.lock().unwrap().push(error.clone());
    }
}

impl RecordingSink {
    fn kinds(&self) -> Vec<ErrorKind> {
        self.0.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[derive(Default)]
struct CountingIndicator {
    shows: AtomicUsize,
    hides: AtomicUsize,
}

impl BusyIndicator for CountingIndicator {
    fn show(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }
    fn hide(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    pipeline: RequestPipeline,
    context: Arc<PipelineContext>,
    sink: Arc<RecordingSink>,
    indicator: Arc<CountingIndicator>,
}

fn harness(server: &ServerGuard) -> Harness {
    let context = Arc::new(PipelineContext::new());
    let sink = Arc::new(RecordingSink::default());
    let indicator = Arc::new(CountingIndicator::default());
    context.init(indicator.clone(), sink.clone());
    let pipeline = RequestPipeline::builder(server.url())
        .context(context.clone())
        .cookie("csrftoken=tok123")
        .build()
        .unwrap();
    Harness {
        pipeline,
        context,
        sink,
        indicator,
    }
}

fn request_error(result: Result<ResponseBody, GatewayError>) -> RequestError {
    match result {
        Err(GatewayError::Request(err)) => err,
        other => panic!("expected a request error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_headers_and_json_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/projects/")
        .match_header("x-csrftoken", "tok123")
        .match_header("content-type", "application/json")
        .match_header("accept", "application/json")
        .match_body(Matcher::Json(json!({"name": "Default Project"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"projectID": "p1", "name": "Default Project"}"#)
        .create_async()
        .await;

    let h = harness(&server);
    let body = h
        .pipeline
        .post(
            "/api/projects/",
            Some(RequestBody::Json(json!({"name": "Default Project"}))),
            None,
            &RequestOptions::default(),
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(body.as_json().unwrap()["projectID"], "p1");
    assert!(h.sink.kinds().is_empty());
}

#[tokio::test]
async fn test_query_params_are_encoded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/experiment-search/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("EXPERIMENT_NAME".into(), "gaussian run & test".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let h = harness(&server);
    let query = QueryParams::from(vec![("EXPERIMENT_NAME", "gaussian run & test"), ("limit", "10")]);
    let body = h
        .pipeline
        .get("/api/experiment-search/", Some(query), &RequestOptions::default())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(body, ResponseBody::Json(json!([])));
}

#[tokio::test]
async fn test_no_content_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/api/projects/p1/")
        .with_status(204)
        .create_async()
        .await;

    let h = harness(&server);
    let body = h
        .pipeline
        .delete("/api/projects/p1/", None, &RequestOptions::default())
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_multipart_lets_transport_set_content_type() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/upload/")
        .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
        .match_header("x-csrftoken", "tok123")
        .with_status(200)
        .with_body(r#"{"uploaded": true}"#)
        .create_async()
        .await;

    let h = harness(&server);
    let form = reqwest::multipart::Form::new().text("experiment-id", "e1");
    h.pipeline
        .post("/api/upload/", Some(RequestBody::Multipart(form)), None, &RequestOptions::default())
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_validation_error_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/experiments/")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"experimentName": ["This field may not be blank."]}"#)
        .create_async()
        .await;

    let h = harness(&server);
    let err = request_error(
        h.pipeline
            .post(
                "/api/experiments/",
                Some(json!({"experimentName": ""}).into()),
                None,
                &RequestOptions::default(),
            )
            .await,
    );

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.details.status, Some(400));
    assert_eq!(err.details.body.as_deref(), Some(r#"{"experimentName":""}"#));
    assert_eq!(
        err.field_errors().unwrap()["experimentName"],
        vec!["This field may not be blank."]
    );
    assert_eq!(h.sink.kinds(), vec![ErrorKind::Validation]);
}

#[tokio::test]
async fn test_ignore_errors_still_reports_unauthenticated() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/missing/")
        .with_status(404)
        .with_body(r#"{"detail": "Not found."}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/projects/")
        .with_status(403)
        .with_body(r#"{"detail": "Session expired", "is_authenticated": false}"#)
        .create_async()
        .await;

    let h = harness(&server);
    let options = RequestOptions::default().ignore_errors();

    let missing = request_error(h.pipeline.get("/api/missing/", None, &options).await);
    assert_eq!(missing.kind, ErrorKind::NotFound);
    assert_eq!(missing.message, "Not found.");
    assert!(h.sink.kinds().is_empty());

    let expired = request_error(h.pipeline.get("/api/projects/", None, &options).await);
    assert!(expired.is_unauthenticated());
    assert_eq!(h.sink.kinds(), vec![ErrorKind::Unauthenticated]);
}

#[tokio::test]
async fn test_invalid_json_on_success() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/projects/")
        .with_status(200)
        .with_body("<html>login</html>")
        .create_async()
        .await;

    let h = harness(&server);
    let err = request_error(h.pipeline.get("/api/projects/", None, &RequestOptions::default()).await);
    assert_eq!(err.kind, ErrorKind::InvalidResponse);
    assert_eq!(err.details.status, Some(200));
    assert_eq!(h.sink.kinds(), vec![ErrorKind::InvalidResponse]);
}

#[tokio::test]
async fn test_network_failure() {
    let context = Arc::new(PipelineContext::new());
    let sink = Arc::new(RecordingSink::default());
    let indicator = Arc::new(CountingIndicator::default());
    context.init(indicator.clone(), sink.clone());
    // Nothing listens on port 9 of localhost in the test environment.
    let pipeline = RequestPipeline::builder("http://127.0.0.1:9/")
        .context(context.clone())
        .build()
        .unwrap();

    let err = request_error(pipeline.get("/api/projects/", None, &RequestOptions::default()).await);
    assert_eq!(err.kind, ErrorKind::NetworkFailure);
    assert_eq!(err.details.status, None);
    assert_eq!(sink.kinds(), vec![ErrorKind::NetworkFailure]);
    assert_eq!(context.in_flight(), 0);
    assert_eq!(indicator.shows.load(Ordering::SeqCst), 1);
    assert_eq!(indicator.hides.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_requests_share_one_call() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/applications/list_all/")
        .with_status(200)
        .with_body(r#"[{"appModuleId": "m1"}]"#)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server);
    let options = RequestOptions::default().cached();
    let (a, b) = tokio::join!(
        h.pipeline.get("/api/applications/list_all/", None, &options),
        h.pipeline.get("/api/applications/list_all/", None, &options),
    );
    let c = h
        .pipeline
        .get("/api/applications/list_all/", None, &options)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(a.unwrap(), c);
    assert_eq!(b.unwrap(), c);
    assert!(h.context.cache().contains(&format!("{}/api/applications/list_all/", server.url())));
}

#[tokio::test]
async fn test_cache_is_keyed_by_query_and_cleared_by_reset() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/projects/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .expect(3)
        .create_async()
        .await;

    let h = harness(&server);
    let options = RequestOptions::default().cached();
    for query in ["limit=1", "limit=2", "limit=1"] {
        h.pipeline
            .get("/api/projects/", Some(QueryParams::from(query)), &options)
            .await
            .unwrap();
    }
    assert_eq!(h.context.cache().len(), 2);

    h.context.reset();
    assert!(h.context.cache().is_empty());
    h.pipeline
        .get("/api/projects/", Some(QueryParams::from("limit=1")), &options)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_indicator_spans_overlapping_requests() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex("^/api/".into()))
        .with_status(200)
        .with_body("{}")
        .expect(3)
        .create_async()
        .await;

    let h = harness(&server);
    let options = RequestOptions::default();
    let (a, b, c) = tokio::join!(
        h.pipeline.get("/api/a/", None, &options),
        h.pipeline.get("/api/b/", None, &options),
        h.pipeline.get("/api/c/", None, &options),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    assert_eq!(h.context.in_flight(), 0);
    assert_eq!(h.indicator.shows.load(Ordering::SeqCst), 1);
    assert_eq!(h.indicator.hides.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_without_spinner_skips_indicator() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/api/a/").with_status(200).with_body("{}").create_async().await;

    let h = harness(&server);
    h.pipeline
        .get("/api/a/", None, &RequestOptions::default().without_spinner())
        .await
        .unwrap();
    assert_eq!(h.indicator.shows.load(Ordering::SeqCst), 0);
}
