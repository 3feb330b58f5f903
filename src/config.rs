use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "defaultbucket";
pub const DEFAULT_DOMAIN: &str = "defaultdomain";
pub const DEFAULT_DOWNLOAD_DIR: &str = "/tmp";

/// Settings shared by every service wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// AWS region the clients talk to
    pub region: String,
    /// Override endpoint, e.g. DynamoDB Local or LocalStack
    pub endpoint_url: Option<String>,
    /// Bucket used by [`crate::S3`]
    pub bucket_name: String,
    /// Domain used by [`crate::SimpleDb`]
    pub domain_name: String,
    /// Local directory S3 downloads land in
    pub download_dir: String,
    /// How long `delete_all_items` waits between dropping and recreating a table
    pub recreate_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            bucket_name: DEFAULT_BUCKET.to_string(),
            domain_name: DEFAULT_DOMAIN.to_string(),
            download_dir: DEFAULT_DOWNLOAD_DIR.to_string(),
            recreate_delay: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Read overrides from `AWS_HELPERS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            region: non_empty("AWS_HELPERS_REGION").unwrap_or(defaults.region),
            endpoint_url: non_empty("AWS_HELPERS_ENDPOINT"),
            bucket_name: non_empty("AWS_HELPERS_BUCKET").unwrap_or(defaults.bucket_name),
            domain_name: non_empty("AWS_HELPERS_DOMAIN").unwrap_or(defaults.domain_name),
            download_dir: non_empty("AWS_HELPERS_DOWNLOAD_DIR").unwrap_or(defaults.download_dir),
            recreate_delay: non_empty("AWS_HELPERS_RECREATE_DELAY_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.recreate_delay),
        }
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_bucket_name(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = bucket_name.into();
        self
    }

    pub fn with_domain_name(mut self, domain_name: impl Into<String>) -> Self {
        self.domain_name = domain_name.into();
        self
    }

    pub fn with_download_dir(mut self, download_dir: impl Into<String>) -> Self {
        self.download_dir = download_dir.into();
        self
    }

    pub fn with_recreate_delay(mut self, recreate_delay: Duration) -> Self {
        self.recreate_delay = recreate_delay;
        self
    }

    /// Resolve credentials and build the SDK configuration for this region
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));

        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.bucket_name, "defaultbucket");
        assert_eq!(config.domain_name, "defaultdomain");
        assert_eq!(config.download_dir, "/tmp");
        assert_eq!(config.endpoint_url, None);
        assert_eq!(config.recreate_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars = HashMap::from([
            ("AWS_HELPERS_REGION", "eu-west-1"),
            ("AWS_HELPERS_ENDPOINT", "http://localhost:8000"),
            ("AWS_HELPERS_BUCKET", "reports"),
            ("AWS_HELPERS_RECREATE_DELAY_SECS", "0"),
        ]);

        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.bucket_name, "reports");
        assert_eq!(config.domain_name, "defaultdomain");
        assert_eq!(config.recreate_delay, Duration::ZERO);
    }

    #[test]
    fn test_from_lookup_ignores_blank_and_invalid_values() {
        let vars = HashMap::from([
            ("AWS_HELPERS_REGION", "  "),
            ("AWS_HELPERS_RECREATE_DELAY_SECS", "soon"),
        ]);

        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_builders() {
        let config = Config::new("ap-south-1")
            .with_endpoint_url("http://localhost:4566")
            .with_bucket_name("b")
            .with_domain_name("d")
            .with_download_dir("/var/tmp")
            .with_recreate_delay(Duration::from_millis(10));

        assert_eq!(config.region, "ap-south-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.bucket_name, "b");
        assert_eq!(config.domain_name, "d");
        assert_eq!(config.download_dir, "/var/tmp");
        assert_eq!(config.recreate_delay, Duration::from_millis(10));
    }
}
