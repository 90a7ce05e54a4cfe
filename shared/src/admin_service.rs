//! Health and readiness endpoints, served on a listener separate from the API.

use crate::http::make_boxed_error_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

pub struct AdminService<F, E> {
    is_ready: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> AdminService<F, E>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self {
            is_ready,
            _error: PhantomData,
        }
    }

    fn respond<B>(&self, req: &Request<B>) -> Response<BoxBody<Bytes, E>>
    where
        E: 'static,
    {
        let ok_body = || Full::new(Bytes::from("ok\n")).map_err(|e| match e {}).boxed();

        match req.uri().path() {
            "/health" => Response::new(ok_body()),
            "/ready" => match (self.is_ready)() {
                true => Response::new(ok_body()),
                false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
            },
            _ => make_boxed_error_response(StatusCode::NOT_FOUND),
        }
    }
}

impl<F, E> Service<Request<Incoming>> for AdminService<F, E>
where
    F: Fn() -> bool,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = self.respond(&req);
        Box::pin(async move { Ok(res) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn get(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    #[test]
    fn test_health_always_ok() {
        let admin = AdminService::<_, Infallible>::new(|| false);
        assert_eq!(admin.respond(&get("/health")).status(), StatusCode::OK);
    }

    #[test]
    fn test_ready_follows_flag() {
        let ready = Arc::new(AtomicBool::new(false));
        let flag = ready.clone();
        let admin = AdminService::<_, Infallible>::new(move || flag.load(Ordering::Relaxed));

        assert_eq!(
            admin.respond(&get("/ready")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        ready.store(true, Ordering::Relaxed);
        assert_eq!(admin.respond(&get("/ready")).status(), StatusCode::OK);
    }

    #[test]
    fn test_unknown_path() {
        let admin = AdminService::<_, Infallible>::new(|| true);
        assert_eq!(admin.respond(&get("/metrics")).status(), StatusCode::NOT_FOUND);
    }
}
