//! R2 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::keys::{object_key, output_key, OUTPUT_CACHE_CONTROL, OUTPUT_CONTENT_TYPE};

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL published objects are served from
    pub public_base_url: Option<String>,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required("R2_ENDPOINT_URL")?,
            access_key_id: required("R2_ACCESS_KEY_ID")?,
            secret_access_key: required("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_URL").ok().filter(|s| !s.trim().is_empty()),
        })
    }

    /// Public URL of an object.
    ///
    /// Served from `R2_PUBLIC_URL` when set, otherwise path-style from the endpoint.
    pub fn public_url(&self, key: &str) -> String {
        match self.public_base_url {
            Some(ref base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "{}/{}/{}",
                self.endpoint_url.trim_end_matches('/'),
                self.bucket_name,
                key
            ),
        }
    }
}

fn required(name: &str) -> StorageResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    config: R2Config,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            config,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = R2Config::from_env()?;
        Self::new(config).await
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    pub fn config(&self) -> &R2Config {
        &self.config
    }

    /// Publish a finished reel and return its public URL.
    pub async fn upload_output(&self, job_id: &str, path: impl AsRef<Path>) -> StorageResult<String> {
        let key = output_key(job_id);
        self.upload_file(path, &key, OUTPUT_CONTENT_TYPE, Some(OUTPUT_CACHE_CONTROL))
            .await?;
        Ok(self.config.public_url(&key))
    }

    /// Upload a file to R2.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type);
        if let Some(cache_control) = cache_control {
            request = request.cache_control(cache_control);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Download object as bytes.
    pub async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    /// Download object to a file, creating parent directories.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;

        info!("Downloaded {} to {}", key, path.display());
        Ok(())
    }

    /// Fetch a photo reference (`gs://bucket/key` or bare key) to a local file.
    pub async fn fetch_reference(&self, reference: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let key = object_key(reference, &self.config.bucket_name)?;
        self.download_file(&key, path).await
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config(public: Option<&str>) -> R2Config {
        R2Config {
            endpoint_url: "https://acct.r2.cloudflarestorage.com/".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            bucket_name: "reels-output".into(),
            region: "auto".into(),
            public_base_url: public.map(Into::into),
        }
    }

    #[test]
    fn test_public_url_with_cdn_base() {
        let cfg = config(Some("https://cdn.example.com/"));
        assert_eq!(
            cfg.public_url(&output_key("j1")),
            "https://cdn.example.com/users/j1/reel.mp4"
        );
    }

    #[test]
    fn test_public_url_falls_back_to_endpoint() {
        let cfg = config(None);
        assert_eq!(
            cfg.public_url("users/j1/reel.mp4"),
            "https://acct.r2.cloudflarestorage.com/reels-output/users/j1/reel.mp4"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_requires_credentials() {
        std::env::remove_var("R2_ENDPOINT_URL");
        assert!(matches!(R2Config::from_env(), Err(StorageError::ConfigError(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_public_url() {
        std::env::set_var("R2_ENDPOINT_URL", "https://r2.test");
        std::env::set_var("R2_ACCESS_KEY_ID", "id");
        std::env::set_var("R2_SECRET_ACCESS_KEY", "secret");
        std::env::set_var("R2_BUCKET_NAME", "reels");
        std::env::set_var("R2_PUBLIC_URL", "https://media.test");
        std::env::remove_var("R2_REGION");

        let cfg = R2Config::from_env().unwrap();
        assert_eq!(cfg.region, "auto");
        assert_eq!(cfg.public_base_url.as_deref(), Some("https://media.test"));

        for var in [
            "R2_ENDPOINT_URL",
            "R2_ACCESS_KEY_ID",
            "R2_SECRET_ACCESS_KEY",
            "R2_BUCKET_NAME",
            "R2_PUBLIC_URL",
        ] {
            std::env::remove_var(var);
        }
    }
}
