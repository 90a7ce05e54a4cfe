//! Typed HTTP client for the credentials API.

use crate::config::DEFAULT_COLLECTION_PATH;
use crate::operations::{Listing, UpsertResult};
use crate::router::ACCOUNT_PARAM;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed with {status}: {error}")]
    Api {
        status: StatusCode,
        error: String,
        detail: Option<String>,
    },
}

#[derive(Serialize)]
struct NewCredential<'a> {
    username: &'a str,
    service: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cred_username: Option<&'a str>,
}

/// One stored credential, secret included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub service: String,
    #[serde(default)]
    pub password: String,
    pub updated_at: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    detail: Option<String>,
}

#[derive(Clone)]
pub struct CredsClient {
    client: reqwest::Client,
    collection_url: String,
}

impl CredsClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_collection_path(base_url, DEFAULT_COLLECTION_PATH)
    }

    pub fn with_collection_path(base_url: &str, collection_path: &str) -> Self {
        CredsClient {
            client: reqwest::Client::new(),
            collection_url: format!("{}{collection_path}", base_url.trim_end_matches('/')),
        }
    }

    pub async fn add_credential(
        &self,
        account: &str,
        service: &str,
        password: &str,
        cred_username: Option<&str>,
    ) -> Result<UpsertResult, ClientError> {
        let response = self
            .client
            .post(&self.collection_url)
            .json(&NewCredential {
                username: account,
                service,
                password,
                cred_username,
            })
            .send()
            .await?;

        decode(response).await
    }

    pub async fn list_services(&self, account: &str) -> Result<Listing, ClientError> {
        let response = self
            .client
            .get(&self.collection_url)
            .query(&[(ACCOUNT_PARAM, account)])
            .send()
            .await?;

        decode(response).await
    }

    pub async fn get_credential(&self, account: &str, service: &str) -> Result<Credential, ClientError> {
        let url = format!("{}/{}", self.collection_url, urlencoding::encode(service));
        let response = self
            .client
            .get(url)
            .query(&[(ACCOUNT_PARAM, account)])
            .send()
            .await?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await?;
    let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
        error: text,
        detail: None,
    });
    tracing::debug!(%status, error = %body.error, "API request failed");

    Err(ClientError::Api {
        status,
        error: body.error,
        detail: body.detail,
    })
}
