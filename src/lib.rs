//! Thin async wrappers around the AWS SDK for Rust
//!
//! Each service gets a small struct holding its SDK client and exposing the
//! handful of calls applications reach for most: DynamoDB item CRUD, query and
//! scan, S3 upload/download/listing, SES email, SimpleDB attributes and select,
//! and Step Functions machines and executions. Paginated reads are driven to
//! completion by [`pagination::fetch_all`], which concatenates every page in
//! arrival order and hands each continuation token back verbatim.
//!
//! # Example
//!
//! ```no_run
//! use aws_helpers::{Config, DynamoDb, KeyAttribute, KeyQuery};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let sdk_config = config.load_sdk_config().await;
//! let dynamodb = DynamoDb::from_config(&sdk_config, &config);
//!
//! let query = KeyQuery::new(KeyAttribute::string("date", "2017-02-12"))
//!     .with_sort_key(KeyAttribute::string("uuid", "077f4450-96ee-4ba8-8faa-831f6350a860"))
//!     .with_index("date-uuid-index");
//!
//! // Follows LastEvaluatedKey until DynamoDB stops returning one
//! let items = dynamodb.query_item("runs", &query).await?;
//! println!("{} items", items.len());
//! # Ok(())
//! # }
//! ```

mod log;

pub mod config;
pub mod dynamodb;
pub mod error;
#[cfg(feature = "lambda")]
pub mod handler;
pub mod pagination;
pub mod s3;
pub mod ses;
pub mod simpledb;
pub mod step_functions;

// Re-export commonly used types
pub use config::Config;
pub use dynamodb::{AttributeFilter, DynamoDb, Item, KeyAttribute, KeyQuery};
pub use error::Error;
pub use pagination::{fetch_all, fetch_all_pages, ContinuationToken, Page, PageFetcher};
pub use s3::S3;
pub use ses::Ses;
pub use simpledb::{Attribute, BatchItem, SimpleDb};
pub use step_functions::{StateMachineRef, StepFunctions};
