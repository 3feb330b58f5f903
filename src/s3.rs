use crate::error::Error;
use crate::log::{debug, info};
use crate::pagination::{fetch_all, Page};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::{Component, Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Keys per `ListObjectsV2` page
pub const LIST_PAGE_SIZE: i32 = 1000;

/// Local paths are mapped to keys by dropping everything up to the last `tmp/`
const SCRATCH_MARKER: &str = "tmp/";

/// S3 convenience wrapper bound to a single bucket
#[derive(Debug, Clone)]
pub struct S3 {
    client: Client,
    bucket_name: String,
    download_dir: PathBuf,
}

impl S3 {
    pub fn new(client: Client, bucket_name: impl Into<String>) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
            download_dir: PathBuf::from(crate::config::DEFAULT_DOWNLOAD_DIR),
        }
    }

    pub fn from_config(sdk_config: &aws_config::SdkConfig, config: &crate::Config) -> Self {
        Self::new(Client::new(sdk_config), config.bucket_name.clone())
            .with_download_dir(&config.download_dir)
    }

    pub fn with_download_dir(mut self, download_dir: impl AsRef<Path>) -> Self {
        self.download_dir = download_dir.as_ref().to_path_buf();
        self
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Upload a local file. The key is `path/file_name` with anything up to
    /// the last `tmp/` removed.
    #[cfg_attr(feature = "tracing", instrument(skip(self), fields(bucket = %self.bucket_name)))]
    pub async fn upload_to_s3(&self, file_name: &str, path: Option<&str>) -> Result<String, Error> {
        let key = object_key(file_name, path);
        let body = ByteStream::from_path(file_name)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::S3(e.to_string()))?;

        info!("Uploaded {} as {}", file_name, key);
        Ok(key)
    }

    /// Upload an in-memory body, returning the object's ETag when S3 sends one
    #[cfg_attr(feature = "tracing", instrument(skip(self, body), fields(bucket = %self.bucket_name)))]
    pub async fn upload_object(
        &self,
        body: impl Into<ByteStream>,
        key: &str,
    ) -> Result<Option<String>, Error> {
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(body.into())
            .send()
            .await
            .map_err(|e| Error::S3(e.to_string()))?;

        Ok(output.e_tag)
    }

    /// Download an object into the download directory, creating parent
    /// directories as needed. Returns the object key.
    #[cfg_attr(feature = "tracing", instrument(skip(self), fields(bucket = %self.bucket_name)))]
    pub async fn download_file(&self, file_name: &str) -> Result<String, Error> {
        let key = strip_scratch_prefix(file_name).to_string();
        let target = local_path(&self.download_dir, &key)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| Error::S3(e.to_string()))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| Error::S3(e.to_string()))?
            .into_bytes();

        tokio::fs::write(&target, &bytes).await?;

        debug!("Downloaded {} bytes to {}", bytes.len(), target.display());
        Ok(key)
    }

    /// File names (last key segment) of every object under a prefix
    #[cfg_attr(feature = "tracing", instrument(skip(self), fields(bucket = %self.bucket_name)))]
    pub async fn get_s3_results(&self, dir_name: &str) -> Result<Vec<String>, Error> {
        let prefix = strip_scratch_prefix(dir_name);

        let keys = fetch_all(prefix, move |prefix, continuation: Option<String>| async move {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix)
                .max_keys(LIST_PAGE_SIZE)
                .set_continuation_token(continuation)
                .send()
                .await
                .map_err(|e| Error::S3(e.to_string()))?;

            // S3 leaves out `Contents` when a page has no objects
            let keys = output
                .contents
                .unwrap_or_default()
                .into_iter()
                .filter_map(|object| object.key)
                .collect();

            Ok::<_, Error>(Page::new(keys, output.next_continuation_token))
        })
        .await?;

        Ok(keys.iter().map(|key| file_name_of(key).to_string()).collect())
    }
}

/// Object key for a local file, optionally nested under `path`
pub fn object_key(file_name: &str, path: Option<&str>) -> String {
    let full_path = match path {
        Some(path) => Path::new(path).join(file_name).to_string_lossy().into_owned(),
        None => file_name.to_string(),
    };
    strip_scratch_prefix(&full_path).to_string()
}

/// Where `key` lands under `download_dir`. Leading slashes are dropped; keys
/// that would still resolve outside the directory are rejected.
fn local_path(download_dir: &Path, key: &str) -> Result<PathBuf, Error> {
    let relative = Path::new(key.trim_start_matches('/'));

    let mut normal = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidInput(format!(
                    "Key {key} escapes the download directory"
                )));
            }
        }
    }

    if normal == 0 {
        return Err(Error::InvalidInput(format!("Key {key:?} names no file")));
    }

    Ok(download_dir.join(relative))
}

fn strip_scratch_prefix(path: &str) -> &str {
    path.rsplit(SCRATCH_MARKER).next().unwrap_or(path)
}

fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_without_path() {
        assert_eq!(object_key("report.csv", None), "report.csv");
    }

    #[test]
    fn test_object_key_strips_scratch_dir() {
        assert_eq!(object_key("report.csv", Some("/tmp/exports")), "exports/report.csv");
        assert_eq!(object_key("/tmp/a/b.txt", None), "a/b.txt");
    }

    #[test]
    fn test_object_key_uses_last_scratch_marker() {
        assert_eq!(object_key("/tmp/x/tmp/y.txt", None), "y.txt");
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("exports/2017/report.csv"), "report.csv");
        assert_eq!(file_name_of("report.csv"), "report.csv");
        assert_eq!(file_name_of("exports/"), "");
    }

    #[test]
    fn test_local_path_stays_under_download_dir() {
        let dir = Path::new("/var/downloads");

        assert_eq!(
            local_path(dir, "exports/report.csv").unwrap(),
            PathBuf::from("/var/downloads/exports/report.csv")
        );
        assert_eq!(
            local_path(dir, "/escape_outside/x.txt").unwrap(),
            PathBuf::from("/var/downloads/escape_outside/x.txt")
        );
        assert_eq!(
            local_path(dir, "./a/./b.txt").unwrap(),
            PathBuf::from("/var/downloads/a/b.txt")
        );
    }

    #[test]
    fn test_local_path_rejects_parent_segments() {
        let dir = Path::new("/var/downloads");

        for key in ["../x.txt", "a/../../x.txt", "/../etc/passwd", "a/.."] {
            assert!(
                matches!(local_path(dir, key), Err(Error::InvalidInput(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_local_path_rejects_empty_key() {
        let dir = Path::new("/var/downloads");

        assert!(matches!(local_path(dir, ""), Err(Error::InvalidInput(_))));
        assert!(matches!(local_path(dir, "///"), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_download_file_rejects_escaping_key_before_touching_disk() {
        let base = std::env::temp_dir().join(format!("aws-helpers-{}", std::process::id()));
        let s3 = S3::new(offline_client(), "bucket").with_download_dir(&base);

        let result = s3.download_file("../aws_helpers_escape_outside/x.txt").await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(!std::env::temp_dir()
            .join("aws_helpers_escape_outside")
            .exists());
    }

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn test_strip_scratch_prefix() {
        assert_eq!(strip_scratch_prefix("/tmp/exports/"), "exports/");
        assert_eq!(strip_scratch_prefix("exports/"), "exports/");
    }
}
