//! The three credential operations: upsert, list and fetch.

use crate::errors::ApiError;
use crate::metrics_defs::{STORE_CALL_DURATION, STORE_CALL_FAILED};
use crate::model::{
    AccountRecord, CREATED_AT, CredentialEntry, RecordLayout, UPDATED_AT, USERNAME,
};
use crate::store::{AttrPath, AttrValue, CredentialStore, StoreError, UpdateItem};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{counter, histogram};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Current Unix time in whole seconds.
pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Validated input of an upsert.
#[derive(Clone, Debug, PartialEq)]
pub struct UpsertRequest {
    pub account_name: String,
    pub service: String,
    pub password: String,
    pub cred_username: Option<String>,
}

impl UpsertRequest {
    /// Reads the upsert fields from a request payload. The account name must be
    /// a non-empty string, the service non-empty after trimming, and the
    /// password present and not null. An empty password is accepted.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, ApiError> {
        let non_empty = |field: &str| {
            payload
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };

        let account_name = non_empty("username").ok_or(ApiError::MissingUpsertFields)?;
        let service = payload
            .get("service")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::MissingUpsertFields)?;
        let password = match payload.get("password") {
            None | Some(Value::Null) => return Err(ApiError::MissingUpsertFields),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(UpsertRequest {
            account_name: account_name.to_string(),
            service: service.to_string(),
            password,
            cred_username: non_empty("cred_username").map(String::from),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpsertResult {
    pub ok: bool,
    pub username: String,
    pub service: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub username: Option<String>,
}

/// Services stored for an account. Never carries secrets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub username: String,
    pub services: BTreeMap<String, ServiceSummary>,
}

#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn CredentialStore>,
    layout: RecordLayout,
    clock: fn() -> u64,
}

impl Credentials {
    pub fn new(store: Arc<dyn CredentialStore>, layout: RecordLayout) -> Self {
        Self::with_clock(store, layout, now_epoch)
    }

    pub fn with_clock(store: Arc<dyn CredentialStore>, layout: RecordLayout, clock: fn() -> u64) -> Self {
        Credentials {
            store,
            layout,
            clock,
        }
    }

    /// Writes one credential entry in two sequential updates.
    ///
    /// The first update makes sure the credentials map exists and stamps the
    /// record; the second writes the entry into it. They cannot be combined:
    /// a single update may not set both a path and one nested inside it, and
    /// setting the nested path alone fails while the map is missing.
    ///
    /// If the second update fails the caller gets an error, but the first has
    /// already taken effect. Nothing is rolled back.
    pub async fn upsert(&self, request: UpsertRequest) -> Result<UpsertResult, ApiError> {
        let now = (self.clock)();
        let account = request.account_name.as_str();

        let ensure_container = UpdateItem::new()
            .set_if_absent(self.layout.credentials(), AttrValue::empty_map())
            .set(AttrPath::attr(UPDATED_AT), now)
            .set_if_absent(AttrPath::attr(CREATED_AT), now);
        self.update(account, ensure_container).await?;

        let entry = CredentialEntry {
            username: request
                .cred_username
                .unwrap_or_else(|| request.account_name.clone()),
            password: request.password,
            updated_at: now,
        };
        let write_entry = UpdateItem::new()
            .set(self.layout.entry(&request.service), entry)
            .set(AttrPath::attr(UPDATED_AT), now);
        self.update(account, write_entry).await.inspect_err(|_| {
            tracing::error!(
                account,
                service = %request.service,
                "Entry write failed after the credentials map was ensured"
            );
        })?;

        tracing::info!(account, service = %request.service, "Credential upserted");

        Ok(UpsertResult {
            ok: true,
            username: request.account_name,
            service: request.service,
        })
    }

    /// Lists service names and their usernames. An unknown account yields an
    /// empty listing.
    pub async fn list(&self, account_name: Option<&str>) -> Result<Listing, ApiError> {
        let account = account_name
            .filter(|a| !a.is_empty())
            .ok_or(ApiError::MissingAccountName)?;

        let services = match self.record(account).await? {
            Some(record) => record
                .credentials
                .into_iter()
                .map(|(service, entry)| {
                    let username = entry.get(USERNAME).and_then(AttrValue::as_s).map(String::from);
                    (service, ServiceSummary { username })
                })
                .collect(),
            None => BTreeMap::new(),
        };

        Ok(Listing {
            username: account.to_string(),
            services,
        })
    }

    /// Returns one stored entry, password included, merged over the account
    /// name and service. Stored fields win on a key clash, so `username` is
    /// the credential's username.
    pub async fn fetch(&self, account_name: Option<&str>, service: &str) -> Result<Value, ApiError> {
        let account = account_name
            .filter(|a| !a.is_empty())
            .ok_or(ApiError::MissingAccountName)?;

        let entry = self
            .record(account)
            .await?
            .and_then(|mut record| record.credentials.remove(service))
            .filter(|entry| !entry.is_empty())
            .ok_or(ApiError::NotFound)?;

        let mut body = Map::new();
        body.insert("username".into(), Value::from(account));
        body.insert("service".into(), Value::from(service));
        for (field, value) in entry {
            body.insert(field, value.to_json());
        }
        Ok(Value::Object(body))
    }

    async fn record(&self, account: &str) -> Result<Option<AccountRecord>, ApiError> {
        let start = Instant::now();
        let result = self.store.get_item(account).await;
        histogram!(STORE_CALL_DURATION, "call" => "get").record(start.elapsed().as_secs_f64());

        let item = result
            .inspect_err(|e| {
                counter!(STORE_CALL_FAILED, "call" => "get").increment(1);
                tracing::error!(account, error = %e, "Store read failed");
            })
            .map_err(ApiError::StoreRead)?;

        item.map(|item| AccountRecord::from_item(item, &self.layout))
            .transpose()
            .inspect_err(|e: &StoreError| tracing::error!(account, error = %e, "Stored record is malformed"))
            .map_err(ApiError::StoreRead)
    }

    async fn update(&self, account: &str, update: UpdateItem) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = self.store.update_item(account, update).await;
        histogram!(STORE_CALL_DURATION, "call" => "update").record(start.elapsed().as_secs_f64());

        result
            .inspect_err(|e| {
                counter!(STORE_CALL_FAILED, "call" => "update").increment(1);
                tracing::error!(account, error = %e, "Store update failed");
            })
            .map_err(ApiError::StoreUpdate)
    }
}
