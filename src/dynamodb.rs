use crate::error::Error;
use crate::log::{debug, info, warn};
use crate::pagination::{fetch_all, Page};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    PutRequest, ScalarAttributeType, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A DynamoDB item, keyed by attribute name
pub type Item = HashMap<String, AttributeValue>;

/// Largest number of requests a single `BatchWriteItem` call accepts
pub const MAX_BATCH_WRITE: usize = 25;

/// A single attribute name/value pair used as a key or an equality filter
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAttribute {
    pub name: String,
    pub value: AttributeValue,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Shorthand for a string-typed attribute
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, AttributeValue::S(value.into()))
    }

    fn into_item(self) -> Item {
        HashMap::from([(self.name, self.value)])
    }
}

/// Key conditions for a query, optionally against a secondary index
#[derive(Debug, Clone, PartialEq)]
pub struct KeyQuery {
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub index_name: Option<String>,
}

impl KeyQuery {
    pub fn new(partition_key: KeyAttribute) -> Self {
        Self {
            partition_key,
            sort_key: None,
            index_name: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Render the key condition with `#pk`/`#sk` name and `:pk`/`:sk` value placeholders
    pub fn expression(&self) -> Expression {
        let mut expression = Expression::default();
        expression.push_eq("pk", &self.partition_key);
        if let Some(sort_key) = &self.sort_key {
            expression.push_eq("sk", sort_key);
        }
        expression
    }
}

/// Two attribute equalities a scan filters on
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFilter {
    pub first: KeyAttribute,
    pub second: KeyAttribute,
}

impl AttributeFilter {
    pub fn new(first: KeyAttribute, second: KeyAttribute) -> Self {
        Self { first, second }
    }

    pub fn expression(&self) -> Expression {
        let mut expression = Expression::default();
        expression.push_eq("a1", &self.first);
        expression.push_eq("a2", &self.second);
        expression
    }
}

/// An `AND`-joined equality expression with its placeholder bindings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl Expression {
    fn push_eq(&mut self, placeholder: &str, attribute: &KeyAttribute) {
        if !self.text.is_empty() {
            self.text.push_str(" AND ");
        }
        self.text.push_str(&format!("#{placeholder} = :{placeholder}"));
        self.names.insert(format!("#{placeholder}"), attribute.name.clone());
        self.values.insert(format!(":{placeholder}"), attribute.value.clone());
    }
}

/// DynamoDB convenience wrapper
#[derive(Debug, Clone)]
pub struct DynamoDb {
    client: Client,
    recreate_delay: Duration,
}

impl DynamoDb {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            recreate_delay: Duration::from_secs(5),
        }
    }

    pub fn from_config(sdk_config: &aws_config::SdkConfig, config: &crate::Config) -> Self {
        Self::new(Client::new(sdk_config)).with_recreate_delay(config.recreate_delay)
    }

    /// How long [`DynamoDb::delete_all_items`] waits for the old table to go away
    pub fn with_recreate_delay(mut self, recreate_delay: Duration) -> Self {
        self.recreate_delay = recreate_delay;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Put every item, at most [`MAX_BATCH_WRITE`] per request.
    ///
    /// Items DynamoDB hands back as unprocessed are not resubmitted; they are
    /// reported as [`Error::Unprocessed`].
    #[cfg_attr(feature = "tracing", instrument(skip(self, items), fields(count = items.len())))]
    pub async fn batch_write(&self, table_name: &str, items: Vec<Item>) -> Result<(), Error> {
        let mut unprocessed = 0;
        let mut requests = items.into_iter().map(|item| {
            PutRequest::builder()
                .set_item(Some(item))
                .build()
                .map(|put| WriteRequest::builder().put_request(put).build())
                .map_err(|e| Error::Internal(e.to_string()))
        });

        loop {
            let chunk = requests
                .by_ref()
                .take(MAX_BATCH_WRITE)
                .collect::<Result<Vec<_>, _>>()?;
            if chunk.is_empty() {
                break;
            }

            debug!("Writing batch of {} items", chunk.len());
            let output = self
                .client
                .batch_write_item()
                .request_items(table_name, chunk)
                .send()
                .await
                .map_err(|e| Error::DynamoDb(e.to_string()))?;

            unprocessed += output
                .unprocessed_items
                .unwrap_or_default()
                .values()
                .map(Vec::len)
                .sum::<usize>();
        }

        if unprocessed > 0 {
            warn!("{} items were not written", unprocessed);
            return Err(Error::Unprocessed(unprocessed));
        }

        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, item)))]
    pub async fn insert_item(&self, table_name: &str, item: Item) -> Result<(), Error> {
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        Ok(())
    }

    /// Fetch an item by its full key, `None` when it does not exist
    #[cfg_attr(feature = "tracing", instrument(skip(self, key)))]
    pub async fn get_item(&self, table_name: &str, key: Item) -> Result<Option<Item>, Error> {
        let output = self
            .client
            .get_item()
            .table_name(table_name)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        Ok(output.item)
    }

    /// Set a single attribute on an existing item
    #[cfg_attr(feature = "tracing", instrument(skip(self, key, value)))]
    pub async fn update_item(
        &self,
        table_name: &str,
        key: Item,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<(), Error> {
        self.client
            .update_item()
            .table_name(table_name)
            .set_key(Some(key))
            .update_expression("SET #attr = :val1")
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_values(":val1", value)
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        Ok(())
    }

    /// All items matching the key conditions, across every result page
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn query_item(&self, table_name: &str, query: &KeyQuery) -> Result<Vec<Item>, Error> {
        let expression = &query.expression();

        let items = fetch_all(query, move |query, start_key| async move {
            let output = self
                .client
                .query()
                .table_name(table_name)
                .set_index_name(query.index_name.clone())
                .key_condition_expression(&expression.text)
                .set_expression_attribute_names(Some(expression.names.clone()))
                .set_expression_attribute_values(Some(expression.values.clone()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| Error::DynamoDb(e.to_string()))?;

            Page::<Item, Item>::try_from(output)
        })
        .await?;

        info!("Query returned {} items", items.len());
        Ok(items)
    }

    /// All items matching both attribute equalities, across every result page.
    ///
    /// Scans read the whole table; prefer an index and [`DynamoDb::query_item`].
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn scan_item(
        &self,
        table_name: &str,
        filter: &AttributeFilter,
    ) -> Result<Vec<Item>, Error> {
        let expression = &filter.expression();

        let items = fetch_all(filter, move |_, start_key| async move {
            let output = self
                .client
                .scan()
                .table_name(table_name)
                .filter_expression(&expression.text)
                .set_expression_attribute_names(Some(expression.names.clone()))
                .set_expression_attribute_values(Some(expression.values.clone()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| Error::DynamoDb(e.to_string()))?;

            Page::from_parts(output.items, output.last_evaluated_key)
        })
        .await?;

        info!("Scan returned {} items", items.len());
        Ok(items)
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn delete_item(&self, table_name: &str, key: KeyAttribute) -> Result<(), Error> {
        self.client
            .delete_item()
            .table_name(table_name)
            .set_key(Some(key.into_item()))
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        Ok(())
    }

    /// Create a table keyed by a single string hash attribute
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn create_table(
        &self,
        table_name: &str,
        hash_name: &str,
        read_throughput: i64,
        write_throughput: i64,
    ) -> Result<(), Error> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(hash_name)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;

        let attribute_definition = AttributeDefinition::builder()
            .attribute_name(hash_name)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;

        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(read_throughput)
            .write_capacity_units(write_throughput)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;

        self.client
            .create_table()
            .table_name(table_name)
            .key_schema(key_schema)
            .attribute_definitions(attribute_definition)
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        info!("Created table");
        Ok(())
    }

    /// Drop every item by deleting and recreating the table.
    ///
    /// A missing table is not an error. The new table gets the default 5/5
    /// throughput.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn delete_all_items(&self, table_name: &str, hash_name: &str) -> Result<(), Error> {
        if let Err(e) = self.client.delete_table().table_name(table_name).send().await {
            warn!("Could not delete table {}: {}", table_name, e);
        }

        sleep(self.recreate_delay).await;

        self.create_table(table_name, hash_name, 5, 5).await
    }
}

/// Adapt a raw query response into a [`Page`]
impl TryFrom<aws_sdk_dynamodb::operation::query::QueryOutput> for Page<Item, Item> {
    type Error = Error;

    fn try_from(output: aws_sdk_dynamodb::operation::query::QueryOutput) -> Result<Self, Error> {
        Page::from_parts(output.items, output.last_evaluated_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    #[test]
    fn test_key_query_partition_only() {
        let query = KeyQuery::new(KeyAttribute::string("date", "2017-02-12"));
        let expression = query.expression();

        assert_eq!(expression.text, "#pk = :pk");
        assert_eq!(expression.names["#pk"], "date");
        assert_eq!(expression.values[":pk"], s("2017-02-12"));
        assert_eq!(query.index_name, None);
    }

    #[test]
    fn test_key_query_with_sort_key_and_index() {
        let query = KeyQuery::new(KeyAttribute::string("date", "2017-02-12"))
            .with_sort_key(KeyAttribute::string("uuid", "077f4450"))
            .with_index("date-uuid-index");
        let expression = query.expression();

        assert_eq!(expression.text, "#pk = :pk AND #sk = :sk");
        assert_eq!(expression.names.len(), 2);
        assert_eq!(expression.names["#sk"], "uuid");
        assert_eq!(expression.values[":sk"], s("077f4450"));
        assert_eq!(query.index_name.as_deref(), Some("date-uuid-index"));
    }

    #[test]
    fn test_attribute_filter_expression() {
        let filter = AttributeFilter::new(
            KeyAttribute::string("status", "done"),
            KeyAttribute::new("size", AttributeValue::N("3".to_string())),
        );
        let expression = filter.expression();

        assert_eq!(expression.text, "#a1 = :a1 AND #a2 = :a2");
        assert_eq!(expression.names["#a1"], "status");
        assert_eq!(expression.names["#a2"], "size");
        assert_eq!(expression.values[":a2"], AttributeValue::N("3".to_string()));
    }

    #[test]
    fn test_reserved_words_stay_out_of_expression_text() {
        let filter = AttributeFilter::new(
            KeyAttribute::string("name", "x"),
            KeyAttribute::string("date", "y"),
        );

        let text = filter.expression().text;
        assert!(!text.contains("name"));
        assert!(!text.contains("date"));
    }

    #[test]
    fn test_key_attribute_into_item() {
        let item = KeyAttribute::string("uuid", "some-uuid-val").into_item();
        assert_eq!(item.len(), 1);
        assert_eq!(item["uuid"], s("some-uuid-val"));
    }

    #[test]
    fn test_query_output_without_items_is_malformed() {
        let output = aws_sdk_dynamodb::operation::query::QueryOutput::builder().build();
        let page: Result<Page<Item, Item>, Error> = output.try_into();
        assert!(matches!(page, Err(Error::MalformedPage(_))));
    }

    #[test]
    fn test_query_output_with_empty_last_key_is_last_page() {
        let output = aws_sdk_dynamodb::operation::query::QueryOutput::builder()
            .items(HashMap::from([("id".to_string(), s("1"))]))
            .set_last_evaluated_key(Some(HashMap::new()))
            .build();
        let page: Page<Item, Item> = output.try_into().unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.is_last());
    }
}
