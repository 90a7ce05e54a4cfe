use crate::errors::ApiError;
use crate::operations::{Credentials, UpsertRequest};
use crate::request::{ApiRequest, SERVICE_PARAM};
use crate::response::ApiResponse;
use http::Method;
use serde::Serialize;
use serde_json::{Value, json};

/// Query parameter carrying the account name on read routes.
pub const ACCOUNT_PARAM: &str = "username";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Preflight,
    Upsert,
    List,
    Fetch,
    NoRoute,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Preflight => "preflight",
            Operation::Upsert => "upsert",
            Operation::List => "list",
            Operation::Fetch => "fetch",
            Operation::NoRoute => "no_route",
        }
    }
}

/// Dispatches normalized requests to the credential operations.
#[derive(Clone)]
pub struct Router {
    credentials: Credentials,
    collection_path: String,
}

impl Router {
    pub fn new(credentials: Credentials, collection_path: String) -> Self {
        Router {
            credentials,
            collection_path,
        }
    }

    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    /// Rules are checked in order and the first match wins:
    ///
    /// 1. `OPTIONS` on any path is a preflight.
    /// 2. `POST` on a path ending with the collection path is an upsert.
    /// 3. `GET` on the collection path without a service parameter is a listing.
    /// 4. `GET` with a service parameter is a fetch.
    pub fn match_route(&self, request: &ApiRequest) -> Operation {
        let on_collection = request.path.ends_with(&self.collection_path);
        let has_service = request.path_param(SERVICE_PARAM).is_some();

        match request.method {
            Method::OPTIONS => Operation::Preflight,
            Method::POST if on_collection => Operation::Upsert,
            Method::GET if on_collection && !has_service => Operation::List,
            Method::GET if has_service => Operation::Fetch,
            _ => Operation::NoRoute,
        }
    }

    /// Routes a request and always produces a response; operation errors are
    /// rendered as error bodies.
    pub async fn route(&self, request: ApiRequest) -> (Operation, ApiResponse) {
        let operation = self.match_route(&request);
        tracing::debug!(operation = operation.as_str(), "Matched route");

        let response = match self.dispatch(operation, &request).await {
            Ok(body) => ApiResponse::ok(body),
            Err(error) => {
                if error.status().is_server_error() {
                    tracing::error!(
                        operation = operation.as_str(),
                        error = %error,
                        "Request failed"
                    );
                } else {
                    tracing::warn!(
                        method = %request.method,
                        path = %request.path,
                        error = %error,
                        "Request rejected"
                    );
                }
                ApiResponse::from(error)
            }
        };

        (operation, response)
    }

    async fn dispatch(&self, operation: Operation, request: &ApiRequest) -> Result<Value, ApiError> {
        match operation {
            Operation::Preflight => Ok(json!({"ok": true})),
            Operation::Upsert => {
                let upsert = UpsertRequest::from_payload(&request.payload)?;
                to_body(self.credentials.upsert(upsert).await?)
            }
            Operation::List => to_body(
                self.credentials
                    .list(request.query_param(ACCOUNT_PARAM))
                    .await?,
            ),
            Operation::Fetch => {
                let service = request.path_param(SERVICE_PARAM).unwrap_or_default();
                self.credentials
                    .fetch(request.query_param(ACCOUNT_PARAM), service)
                    .await
            }
            Operation::NoRoute => Err(ApiError::RouteNotFound),
        }
    }
}

fn to_body<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Unexpected(e.to_string()))
}
