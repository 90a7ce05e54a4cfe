use crate::CredsApiError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS, REQUESTS_INFLIGHT};
use crate::request::ApiRequest;
use crate::router::Router;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::{counter, gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

/// Counts a request as in flight until dropped, including when hyper drops
/// the request future because the client went away.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        InflightGuard
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

/// Serves the credentials API over HTTP.
pub struct CredsService {
    router: Router,
}

impl CredsService {
    pub fn new(router: Router) -> Self {
        CredsService { router }
    }
}

impl Service<Request<Incoming>> for CredsService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = CredsApiError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.router.clone();

        Box::pin(async move {
            let start = Instant::now();
            let inflight = InflightGuard::new();

            let (parts, body) = req.into_parts();
            // An unreadable body is handled like an absent one
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to read request body");
                    Bytes::new()
                }
            };

            let request = ApiRequest::from_http(
                parts.method,
                &parts.uri,
                &body,
                router.collection_path(),
            );
            let (operation, response) = router.route(request).await;

            drop(inflight);
            counter!(
                REQUESTS,
                "operation" => operation.as_str(),
                "status" => response.status.as_u16().to_string()
            )
            .increment(1);
            histogram!(REQUEST_DURATION, "operation" => operation.as_str())
                .record(start.elapsed().as_secs_f64());

            Ok(response.into_http())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::start_server;
    use http_body_util::Full;
    use hyper::{Method, StatusCode};
    use hyper_util::client::legacy::Client;
    use hyper_util::rt::TokioExecutor;
    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Arc;

    async fn send(addr: SocketAddr, method: Method, path: &str, body: &str) -> (StatusCode, hyper::HeaderMap, Value) {
        let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
        let request = Request::builder()
            .method(method)
            .uri(format!("http://{addr}{path}"))
            .body(Full::new(Bytes::from(body.to_owned())))
            .unwrap();

        let response = client.request(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[derive(Default)]
    struct TestGauge(parking_lot::Mutex<f64>);

    impl GaugeFn for TestGauge {
        fn increment(&self, value: f64) {
            *self.0.lock() += value;
        }

        fn decrement(&self, value: f64) {
            *self.0.lock() -= value;
        }

        fn set(&self, value: f64) {
            *self.0.lock() = value;
        }
    }

    /// Routes every gauge to one shared value; other metrics are dropped.
    #[derive(Default)]
    struct GaugeRecorder(Arc<TestGauge>);

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::from_arc(self.0.clone())
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_inflight_gauge_released_on_drop() {
        let recorder = GaugeRecorder::default();
        let value = recorder.0.clone();

        metrics::with_local_recorder(&recorder, || {
            let first = InflightGuard::new();
            let second = InflightGuard::new();
            assert_eq!(*value.0.lock(), 2.0);

            // A cancelled request future drops its guard without finishing
            drop(first);
            assert_eq!(*value.0.lock(), 1.0);
            drop(second);
        });

        assert_eq!(*value.0.lock(), 0.0);
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let addr = start_server().await;

        let (status, headers, body) = send(
            addr,
            Method::POST,
            "/creds",
            r#"{"username": "alice", "service": "github", "password": "hunter2"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(body, json!({"ok": true, "username": "alice", "service": "github"}));

        let (status, _, body) = send(addr, Method::GET, "/creds?username=alice", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"username": "alice", "services": {"github": {"username": "alice"}}})
        );

        let (status, _, body) = send(addr, Method::GET, "/creds/github?username=alice", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["password"], "hunter2");
        assert_eq!(body["username"], "alice");
        assert_eq!(body["service"], "github");
    }

    #[tokio::test]
    async fn test_error_responses() {
        let addr = start_server().await;

        let (status, headers, body) = send(addr, Method::OPTIONS, "/whatever", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["access-control-allow-methods"], "GET,POST,OPTIONS");
        assert_eq!(body, json!({"ok": true}));

        let (status, _, body) = send(addr, Method::POST, "/creds", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": "required: username (non-empty), service (non-empty), password"})
        );

        let (status, _, body) = send(addr, Method::GET, "/creds/github?username=nobody", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "not found"}));

        let (status, _, body) = send(addr, Method::DELETE, "/creds", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "route not found"}));
    }
}
