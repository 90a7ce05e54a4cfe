//! DynamoDB backend. Updates are rendered as a single `SET` update expression
//! so every action of one call is applied atomically by the service.

use super::{AttrValue, CredentialStore, Item, SetMode, StoreError, UpdateItem};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;

pub struct DynamoDbStore {
    client: Client,
    table: String,
    partition_key: String,
}

impl std::fmt::Debug for DynamoDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbStore")
            .field("table", &self.table)
            .field("partition_key", &self.partition_key)
            .finish()
    }
}

impl DynamoDbStore {
    /// Builds a client from the SDK's default provider chain, with optional
    /// region and endpoint overrides.
    pub async fn new(
        table: &str,
        partition_key: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        tracing::info!(table, region, endpoint, "DynamoDB client ready");
        Self::from_client(Client::new(&sdk_config), table, partition_key)
    }

    pub fn from_client(client: Client, table: &str, partition_key: &str) -> Self {
        DynamoDbStore {
            client,
            table: table.to_string(),
            partition_key: partition_key.to_string(),
        }
    }

    fn key(&self, key: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([(
            self.partition_key.clone(),
            AttributeValue::S(key.to_string()),
        )])
    }
}

#[async_trait]
impl CredentialStore for DynamoDbStore {
    async fn get_item(&self, key: &str) -> Result<Option<Item>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(self.key(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::Service(DisplayErrorContext(&e).to_string()))?;

        Ok(output.item.map(|item| {
            item.into_iter()
                .map(|(name, value)| (name, from_attribute_value(value)))
                .collect()
        }))
    }

    async fn update_item(&self, key: &str, update: UpdateItem) -> Result<(), StoreError> {
        let rendered = RenderedUpdate::from(&update);
        let values = rendered
            .values
            .into_iter()
            .map(|(placeholder, value)| (placeholder, to_attribute_value(value)))
            .collect();

        self.client
            .update_item()
            .table_name(&self.table)
            .set_key(Some(self.key(key)))
            .update_expression(rendered.expression)
            .set_expression_attribute_names(Some(rendered.names))
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::None)
            .send()
            .await
            .map_err(|e| StoreError::Service(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

/// An update expression with its placeholder tables. Every attribute name is
/// passed through a `#nN` placeholder so reserved words and arbitrary service
/// names are safe.
#[derive(Debug, PartialEq)]
struct RenderedUpdate {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttrValue>,
}

impl From<&UpdateItem> for RenderedUpdate {
    fn from(update: &UpdateItem) -> Self {
        let mut placeholders: HashMap<&str, String> = HashMap::new();
        let mut values = HashMap::new();
        let mut clauses = Vec::with_capacity(update.actions().len());

        for (i, action) in update.actions().iter().enumerate() {
            let path = action
                .path
                .segments()
                .iter()
                .map(|segment| {
                    let next = placeholders.len();
                    placeholders
                        .entry(segment.as_str())
                        .or_insert_with(|| format!("#n{next}"))
                        .clone()
                })
                .collect::<Vec<_>>()
                .join(".");

            let value = format!(":v{i}");
            clauses.push(match action.mode {
                SetMode::Always => format!("{path} = {value}"),
                SetMode::IfAbsent => format!("{path} = if_not_exists({path}, {value})"),
            });
            values.insert(value, action.value.clone());
        }

        RenderedUpdate {
            expression: format!("SET {}", clauses.join(", ")),
            names: placeholders
                .into_iter()
                .map(|(name, placeholder)| (placeholder, name.to_string()))
                .collect(),
            values,
        }
    }
}

fn to_attribute_value(value: AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s),
        AttrValue::N(n) => AttributeValue::N(n),
        AttrValue::Bool(b) => AttributeValue::Bool(b),
        AttrValue::Null => AttributeValue::Null(true),
        AttrValue::M(m) => AttributeValue::M(
            m.into_iter()
                .map(|(k, v)| (k, to_attribute_value(v)))
                .collect(),
        ),
        AttrValue::L(l) => AttributeValue::L(l.into_iter().map(to_attribute_value).collect()),
    }
}

// Sets become lists and binary values become base64 text, since neither has a
// JSON counterpart.
fn from_attribute_value(value: AttributeValue) -> AttrValue {
    match value {
        AttributeValue::S(s) => AttrValue::S(s),
        AttributeValue::N(n) => AttrValue::N(n),
        AttributeValue::Bool(b) => AttrValue::Bool(b),
        AttributeValue::M(m) => AttrValue::M(
            m.into_iter()
                .map(|(k, v)| (k, from_attribute_value(v)))
                .collect(),
        ),
        AttributeValue::L(l) => AttrValue::L(l.into_iter().map(from_attribute_value).collect()),
        AttributeValue::Ss(ss) => AttrValue::L(ss.into_iter().map(AttrValue::S).collect()),
        AttributeValue::Ns(ns) => AttrValue::L(ns.into_iter().map(AttrValue::N).collect()),
        AttributeValue::B(blob) => AttrValue::S(STANDARD.encode(blob.as_ref())),
        AttributeValue::Bs(blobs) => AttrValue::L(
            blobs
                .into_iter()
                .map(|blob| AttrValue::S(STANDARD.encode(blob.as_ref())))
                .collect(),
        ),
        _ => AttrValue::Null,
    }
}
