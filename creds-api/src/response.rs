use crate::errors::ApiError;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderName, HeaderValue,
};
use http::{Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Headers sent with every response, with the capitalized spelling used in
/// proxy results. `HeaderName` itself is always lowercase.
pub const RESPONSE_HEADERS: [(HeaderName, &str, &str); 4] = [
    (CONTENT_TYPE, "Content-Type", "application/json"),
    (ACCESS_CONTROL_ALLOW_ORIGIN, "Access-Control-Allow-Origin", "*"),
    (ACCESS_CONTROL_ALLOW_HEADERS, "Access-Control-Allow-Headers", "content-type"),
    (ACCESS_CONTROL_ALLOW_METHODS, "Access-Control-Allow-Methods", "GET,POST,OPTIONS"),
];

/// A transport-independent response: a status and a JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        ApiResponse {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn into_http<E>(self) -> Response<BoxBody<Bytes, E>>
    where
        E: 'static,
    {
        let body = Full::new(Bytes::from(self.body.to_string()))
            .map_err(|e| match e {})
            .boxed();

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        for (name, _, value) in RESPONSE_HEADERS {
            response
                .headers_mut()
                .insert(name, HeaderValue::from_static(value));
        }
        response
    }

    pub fn into_proxy_result(self) -> ProxyResult {
        ProxyResult {
            status_code: self.status.as_u16(),
            headers: RESPONSE_HEADERS
                .iter()
                .map(|(_, name, value)| (*name, *value))
                .collect(),
            body: self.body.to_string(),
        }
    }
}

impl From<ApiError> for ApiResponse {
    fn from(error: ApiError) -> Self {
        let mut body = Map::new();
        body.insert("error".into(), Value::from(error.code()));
        if let Some(detail) = error.detail() {
            body.insert("detail".into(), Value::from(detail));
        }

        ApiResponse {
            status: error.status(),
            body: Value::Object(body),
        }
    }
}

/// The result document of an API gateway proxy integration.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResult {
    pub status_code: u16,
    pub headers: BTreeMap<&'static str, &'static str>,
    pub body: String,
}
