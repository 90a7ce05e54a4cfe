use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TABLE: &str = "accountly-credentials";
pub const DEFAULT_REGION: &str = "us-east-2";
pub const DEFAULT_PARTITION_KEY: &str = "act-name";
pub const DEFAULT_CREDENTIALS_ATTRIBUTE: &str = "creds";
pub const DEFAULT_COLLECTION_PATH: &str = "/creds";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Invalid collection path: {0}")]
    InvalidCollectionPath(String),

    #[error("Empty table name")]
    EmptyTable,

    #[error("Empty partition key attribute")]
    EmptyPartitionKey,

    #[error("Empty credentials attribute")]
    EmptyCredentialsAttribute,
}

/// Backing store selection
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreType {
    /// Process-local store, for development and tests
    Memory,
    Dynamodb {
        #[serde(default = "default_table")]
        table: String,
        /// `None` defers to the SDK's region provider chain
        #[serde(default = "default_region")]
        region: Option<String>,
        /// Endpoint override, e.g. a local emulator
        endpoint: Option<String>,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub r#type: StoreType,
    /// Name of the partition key attribute holding the account name
    #[serde(default = "default_partition_key")]
    pub partition_key: String,
    /// Name of the map attribute holding one entry per service
    #[serde(default = "default_credentials_attribute")]
    pub credentials_attribute: String,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let StoreType::Dynamodb { table, .. } = &self.r#type
            && table.is_empty()
        {
            return Err(ValidationError::EmptyTable);
        }
        if self.partition_key.is_empty() {
            return Err(ValidationError::EmptyPartitionKey);
        }
        if self.credentials_attribute.is_empty() {
            return Err(ValidationError::EmptyCredentialsAttribute);
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            r#type: StoreType::Memory,
            partition_key: default_partition_key(),
            credentials_attribute: default_credentials_attribute(),
        }
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }

    fn api_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }

    fn admin_default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "Listener::api_default")]
    pub listener: Listener,
    #[serde(default = "Listener::admin_default")]
    pub admin_listener: Listener,
    /// Path suffix of the credentials collection, e.g. `/creds`. Requests
    /// match when their path ends with it, so any stage prefix is accepted.
    #[serde(default = "default_collection_path")]
    pub collection_path: String,
    pub store: StoreConfig,
}

/// Default listeners over an in-memory store.
impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::api_default(),
            admin_listener: Listener::admin_default(),
            collection_path: default_collection_path(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        let path = &self.collection_path;
        if !path.starts_with('/') || path.len() < 2 || path[1..].split('/').any(str::is_empty) {
            return Err(ValidationError::InvalidCollectionPath(path.clone()));
        }

        self.store.validate()
    }
}

fn default_table() -> String {
    DEFAULT_TABLE.into()
}

fn default_region() -> Option<String> {
    Some(DEFAULT_REGION.into())
}

fn default_partition_key() -> String {
    DEFAULT_PARTITION_KEY.into()
}

fn default_credentials_attribute() -> String {
    DEFAULT_CREDENTIALS_ATTRIBUTE.into()
}

fn default_collection_path() -> String {
    DEFAULT_COLLECTION_PATH.into()
}
