use crate::error::Error;
use crate::log::{debug, info};
use crate::pagination::{fetch_all, Page};
use rusoto_core::Region;
use rusoto_sdb::{
    BatchPutAttributesRequest, CreateDomainRequest, DeleteDomainRequest, Item,
    PutAttributesRequest, ReplaceableAttribute, ReplaceableItem, SelectRequest, SelectResult,
    SimpleDb as _, SimpleDbClient,
};
use std::str::FromStr;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Largest number of items a single `BatchPutAttributes` call accepts
pub const MAX_BATCH_PUT: usize = 25;

/// A name/value pair to store on an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Overwrite existing values instead of adding another one
    pub replace: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: false,
        }
    }

    pub fn replacing(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            replace: true,
            ..Self::new(name, value)
        }
    }

    fn to_replaceable(&self) -> ReplaceableAttribute {
        ReplaceableAttribute {
            name: self.name.clone(),
            value: self.value.clone(),
            replace: Some(self.replace),
        }
    }
}

/// One item of a batch put
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    fn to_replaceable(&self) -> ReplaceableItem {
        ReplaceableItem {
            name: self.name.clone(),
            attributes: to_replaceable_attributes(&self.attributes),
        }
    }
}

/// SimpleDB convenience wrapper bound to a default domain.
///
/// The AWS SDK for Rust has no SimpleDB client, so this one sits on rusoto.
#[derive(Clone)]
pub struct SimpleDb {
    client: SimpleDbClient,
    domain_name: String,
}

impl SimpleDb {
    pub fn new(client: SimpleDbClient, domain_name: impl Into<String>) -> Self {
        Self {
            client,
            domain_name: domain_name.into(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self, Error> {
        let client = SimpleDbClient::new(region(config)?);
        Ok(Self::new(client, config.domain_name.clone()))
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// Store a single item
    #[cfg_attr(feature = "tracing", instrument(skip(self, attributes), fields(domain = %self.domain_name)))]
    pub async fn insert(&self, item_name: &str, attributes: &[Attribute]) -> Result<(), Error> {
        self.client
            .put_attributes(put_attributes_request(&self.domain_name, item_name, attributes))
            .await
            .map_err(|e| Error::SimpleDb(e.to_string()))?;

        Ok(())
    }

    /// Store up to [`MAX_BATCH_PUT`] items in one request
    #[cfg_attr(feature = "tracing", instrument(skip(self, items), fields(domain = %self.domain_name, count = items.len())))]
    pub async fn batch_insert(&self, items: &[BatchItem]) -> Result<(), Error> {
        let request = batch_put_request(&self.domain_name, items)?;

        self.client
            .batch_put_attributes(request)
            .await
            .map_err(|e| Error::SimpleDb(e.to_string()))?;

        Ok(())
    }

    /// Values of the first attribute of every item where `attribute_name` equals `value`
    #[cfg_attr(feature = "tracing", instrument(skip(self), fields(domain = %self.domain_name)))]
    pub async fn query(&self, attribute_name: &str, value: &str) -> Result<Vec<String>, Error> {
        let expression = select_expression(&self.domain_name, attribute_name, value);
        let items = self.select(&expression).await?;

        info!("Select returned {} items", items.len());
        Ok(format_items(&items))
    }

    /// Every item a select expression matches, across all result pages
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn select(&self, expression: &str) -> Result<Vec<Item>, Error> {
        fetch_all(expression, move |expression, next_token: Option<String>| async move {
            debug!("Selecting page");
            let result = self
                .client
                .select(select_request(expression, next_token))
                .await
                .map_err(|e| Error::SimpleDb(e.to_string()))?;

            Ok::<_, Error>(select_page(result))
        })
        .await
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn create_domain(&self, domain_name: &str) -> Result<(), Error> {
        self.client
            .create_domain(CreateDomainRequest {
                domain_name: domain_name.to_string(),
            })
            .await
            .map_err(|e| Error::SimpleDb(e.to_string()))?;

        info!("Created domain");
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn delete_domain(&self, domain_name: &str) -> Result<(), Error> {
        self.client
            .delete_domain(DeleteDomainRequest {
                domain_name: domain_name.to_string(),
            })
            .await
            .map_err(|e| Error::SimpleDb(e.to_string()))?;

        info!("Deleted domain");
        Ok(())
    }
}

/// `select * from `domain` where `attribute`="value"`, quoting names and values
pub fn select_expression(domain_name: &str, attribute_name: &str, value: &str) -> String {
    format!(
        "select * from `{}` where `{}`=\"{}\"",
        domain_name.replace('`', "``"),
        attribute_name.replace('`', "``"),
        value.replace('"', "\"\"")
    )
}

/// The first attribute value of each item; items without attributes are skipped
pub fn format_items(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.attributes.first())
        .map(|attribute| attribute.value.clone())
        .collect()
}

/// The configured region, or a custom endpoint when one is set
fn region(config: &crate::Config) -> Result<Region, Error> {
    match &config.endpoint_url {
        Some(endpoint) => Ok(Region::Custom {
            name: config.region.clone(),
            endpoint: endpoint.clone(),
        }),
        None => Region::from_str(&config.region).map_err(|e| Error::InvalidInput(e.to_string())),
    }
}

fn put_attributes_request(
    domain_name: &str,
    item_name: &str,
    attributes: &[Attribute],
) -> PutAttributesRequest {
    PutAttributesRequest {
        domain_name: domain_name.to_string(),
        item_name: item_name.to_string(),
        attributes: to_replaceable_attributes(attributes),
        ..Default::default()
    }
}

fn batch_put_request(domain_name: &str, items: &[BatchItem]) -> Result<BatchPutAttributesRequest, Error> {
    if items.len() > MAX_BATCH_PUT {
        return Err(Error::InvalidInput(format!(
            "Batch of {} items exceeds the limit of {}",
            items.len(),
            MAX_BATCH_PUT
        )));
    }

    Ok(BatchPutAttributesRequest {
        domain_name: domain_name.to_string(),
        items: items.iter().map(BatchItem::to_replaceable).collect(),
        ..Default::default()
    })
}

fn select_request(expression: &str, next_token: Option<String>) -> SelectRequest {
    SelectRequest {
        select_expression: expression.to_string(),
        next_token,
        ..Default::default()
    }
}

// SimpleDB leaves out `Items` on an empty page
fn select_page(result: SelectResult) -> Page<Item, String> {
    Page::new(result.items.unwrap_or_default(), result.next_token)
}

fn to_replaceable_attributes(attributes: &[Attribute]) -> Vec<ReplaceableAttribute> {
    attributes.iter().map(Attribute::to_replaceable).collect()
}
