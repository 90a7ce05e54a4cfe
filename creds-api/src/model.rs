//! The account record and credential entries, as laid out in the store.
//!
//! One record per account, keyed by account name:
//!
//! ```text
//! {
//!   "<partition_key>": "<account name>",
//!   "<credentials_attribute>": {
//!     "<service>": { "username": "...", "password": "...", "updated_at": <epoch> }
//!   },
//!   "created_at": <epoch>,
//!   "updated_at": <epoch>
//! }
//! ```

use crate::config::StoreConfig;
use crate::store::{AttrPath, AttrValue, Item, StoreError};
use std::collections::HashMap;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";

/// Attribute names that vary per deployment.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordLayout {
    pub partition_key: String,
    pub credentials_attribute: String,
}

impl RecordLayout {
    pub fn credentials(&self) -> AttrPath {
        AttrPath::attr(&self.credentials_attribute)
    }

    pub fn entry(&self, service: &str) -> AttrPath {
        self.credentials().child(service)
    }
}

impl From<&StoreConfig> for RecordLayout {
    fn from(config: &StoreConfig) -> Self {
        RecordLayout {
            partition_key: config.partition_key.clone(),
            credentials_attribute: config.credentials_attribute.clone(),
        }
    }
}

impl Default for RecordLayout {
    fn default() -> Self {
        RecordLayout::from(&StoreConfig::default())
    }
}

/// One service's credential, as written by an upsert.
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialEntry {
    pub username: String,
    pub password: String,
    pub updated_at: u64,
}

impl From<CredentialEntry> for AttrValue {
    fn from(entry: CredentialEntry) -> Self {
        AttrValue::M(HashMap::from([
            (USERNAME.to_string(), AttrValue::S(entry.username)),
            (PASSWORD.to_string(), AttrValue::S(entry.password)),
            (UPDATED_AT.to_string(), AttrValue::from(entry.updated_at)),
        ]))
    }
}

/// A stored entry, kept as raw attributes so anything stored alongside the
/// known fields is passed back on fetch.
pub type StoredEntry = HashMap<String, AttrValue>;

#[derive(Clone, Debug, PartialEq)]
pub struct AccountRecord {
    pub account_name: String,
    pub credentials: HashMap<String, StoredEntry>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl AccountRecord {
    pub fn from_item(mut item: Item, layout: &RecordLayout) -> Result<Self, StoreError> {
        let account_name = match item.remove(&layout.partition_key) {
            Some(AttrValue::S(name)) => name,
            other => {
                return Err(StoreError::Malformed(format!(
                    "partition key {} is {other:?}",
                    layout.partition_key
                )));
            }
        };

        let credentials = match item.remove(&layout.credentials_attribute) {
            None | Some(AttrValue::Null) => HashMap::new(),
            Some(AttrValue::M(entries)) => entries
                .into_iter()
                .map(|(service, entry)| match entry {
                    AttrValue::M(fields) => Ok((service, fields)),
                    _ => Err(StoreError::Malformed(format!(
                        "entry {service} of {account_name} is not a map"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(StoreError::Malformed(format!(
                    "{} of {account_name} is not a map",
                    layout.credentials_attribute
                )));
            }
        };

        Ok(AccountRecord {
            credentials,
            created_at: item.get(CREATED_AT).and_then(AttrValue::as_epoch),
            updated_at: item.get(UPDATED_AT).and_then(AttrValue::as_epoch),
            account_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(creds: AttrValue) -> Item {
        HashMap::from([
            ("act-name".to_string(), AttrValue::from("alice")),
            ("creds".to_string(), creds),
            (CREATED_AT.to_string(), AttrValue::from(1u64)),
            (UPDATED_AT.to_string(), AttrValue::from(2u64)),
        ])
    }

    #[test]
    fn test_entry_layout() {
        let value = AttrValue::from(CredentialEntry {
            username: "alice".into(),
            password: "hunter2".into(),
            updated_at: 2,
        });

        let fields = value.as_m().unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[PASSWORD], AttrValue::from("hunter2"));
        assert_eq!(fields[UPDATED_AT], AttrValue::N("2".into()));
    }

    #[test]
    fn test_from_item() {
        let entry = AttrValue::from(CredentialEntry {
            username: "al".into(),
            password: "pw".into(),
            updated_at: 2,
        });
        let creds = AttrValue::M(HashMap::from([("github".to_string(), entry)]));

        let record = AccountRecord::from_item(item(creds), &RecordLayout::default()).unwrap();

        assert_eq!(record.account_name, "alice");
        assert_eq!(record.created_at, Some(1));
        assert_eq!(record.updated_at, Some(2));
        assert_eq!(
            record.credentials["github"][USERNAME],
            AttrValue::from("al")
        );
    }

    #[test]
    fn test_missing_container_is_empty() {
        let mut raw = item(AttrValue::Null);
        raw.remove("creds");
        let record = AccountRecord::from_item(raw, &RecordLayout::default()).unwrap();
        assert!(record.credentials.is_empty());
    }

    #[test]
    fn test_non_map_container_is_malformed() {
        let err = AccountRecord::from_item(item(AttrValue::from("x")), &RecordLayout::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn test_layout_paths() {
        let layout = RecordLayout {
            partition_key: "pk".into(),
            credentials_attribute: "vault".into(),
        };
        assert_eq!(layout.entry("github").to_string(), "vault.github");
    }
}
