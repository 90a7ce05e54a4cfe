//! Normalizes inbound requests into [`ApiRequest`], whichever transport they
//! arrived on.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::Method;
use hyper::body::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const SERVICE_PARAM: &str = "service";

/// A transport-independent request.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    /// Parsed JSON body. Empty when the body is missing or unusable.
    pub payload: Map<String, Value>,
}

impl ApiRequest {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Builds a request from a native HTTP request. The `service` path
    /// parameter is taken from the segment after `collection_path`.
    pub fn from_http(
        method: Method,
        uri: &http::Uri,
        body: &[u8],
        collection_path: &str,
    ) -> Self {
        let path = uri.path().to_string();
        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let mut path_params = HashMap::new();
        if let Some(service) = service_segment(&path, collection_path) {
            path_params.insert(SERVICE_PARAM.to_string(), service);
        }

        ApiRequest {
            method,
            path,
            query,
            path_params,
            payload: parse_payload(body),
        }
    }
}

fn service_segment(path: &str, collection_path: &str) -> Option<String> {
    let (parent, segment) = path.rsplit_once('/')?;
    if segment.is_empty() || !parent.ends_with(collection_path) {
        return None;
    }
    urlencoding::decode(segment)
        .ok()
        .map(|s| s.into_owned())
        .filter(|s| !s.is_empty())
}

/// Parses a body as a JSON object. Anything else yields an empty payload.
pub fn parse_payload(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct HttpContext {
    pub method: Option<String>,
    pub path: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RequestContext {
    pub http: Option<HttpContext>,
}

/// An API gateway proxy integration event. Both payload versions are
/// accepted; version 2 carries method and path under `requestContext.http`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    pub http_method: Option<String>,
    pub path: Option<String>,
    pub request_context: Option<RequestContext>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub path_parameters: Option<HashMap<String, String>>,
    pub body: Option<String>,
    pub is_base64_encoded: Option<bool>,
}

impl ProxyEvent {
    fn http_context(&self) -> Option<&HttpContext> {
        self.request_context.as_ref()?.http.as_ref()
    }

    pub fn method(&self) -> &str {
        self.http_context()
            .and_then(|http| http.method.as_deref())
            .or(self.http_method.as_deref())
            .unwrap_or("GET")
    }

    pub fn path(&self) -> &str {
        self.http_context()
            .and_then(|http| http.path.as_deref())
            .or(self.path.as_deref())
            .unwrap_or("/")
    }

    fn body_bytes(&self) -> Bytes {
        let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) else {
            return Bytes::new();
        };
        if !self.is_base64_encoded.unwrap_or(false) {
            return Bytes::copy_from_slice(body.as_bytes());
        }
        match STANDARD.decode(body) {
            Ok(decoded) => Bytes::from(decoded),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring body that is not valid base64");
                Bytes::new()
            }
        }
    }

    /// Normalizes the event. Returns `None` if the method is not a valid
    /// HTTP method token.
    pub fn into_request(self) -> Option<ApiRequest> {
        let method = Method::from_bytes(self.method().as_bytes()).ok()?;
        let path = self.path().to_string();
        let payload = parse_payload(&self.body_bytes());

        Some(ApiRequest {
            method,
            path,
            query: self.query_string_parameters.unwrap_or_default(),
            path_params: self.path_parameters.unwrap_or_default(),
            payload,
        })
    }
}
