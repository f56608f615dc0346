//! S3-compatible object store client.
//!
//! Path-style addressing and static credentials make the client work
//! against MinIO as well as AWS.

use crate::config::S3Configuration;
use crate::{ExporterError, Result};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;

const CREDENTIALS_PROVIDER: &str = "aggregator-exporter";

/// Upload target bucket on an S3-compatible endpoint.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// Returns `http(s)://<endpoint_url>:<endpoint_port>`.
pub fn endpoint_url(config: &S3Configuration) -> String {
    let scheme = if config.use_ssl { "https" } else { "http" };
    format!("{}://{}:{}", scheme, config.endpoint_url, config.endpoint_port)
}

impl S3Store {
    /// Builds a client for the configured endpoint and bucket.
    ///
    /// No request is sent; use [`S3Store::bucket_exists`] to check the
    /// connection.
    pub fn connect(config: &S3Configuration) -> Result<Self> {
        if config.endpoint_url.is_empty() {
            return Err(ExporterError::configuration("s3.endpoint_url must be set"));
        }
        if config.bucket.is_empty() {
            return Err(ExporterError::configuration("s3.bucket must be set"));
        }

        let endpoint = endpoint_url(config);
        tracing::info!(
            endpoint = %endpoint,
            bucket = %config.bucket,
            storage_type = %config.r#type,
            "Connecting to S3"
        );

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            endpoint,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Checks whether the bucket exists and is reachable.
    ///
    /// # Errors
    /// Returns a connection error for failures other than a missing bucket.
    pub async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let error = e.into_service_error();
                if error.is_not_found() {
                    Ok(false)
                } else {
                    Err(ExporterError::connection_failed(
                        format!("Unable to access bucket '{}' at {}", self.bucket, self.endpoint),
                        error,
                    ))
                }
            }
        }
    }

    /// Uploads one object.
    pub async fn put_object(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                ExporterError::write_failed(
                    format!("Failed to upload '{}' to bucket '{}'", key, self.bucket),
                    e.into_service_error(),
                )
            })?;

        tracing::debug!(key, bucket = %self.bucket, size, "Object uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config() -> S3Configuration {
        S3Configuration {
            endpoint_url: "127.0.0.1".to_string(),
            endpoint_port: 9000,
            access_key_id: "foobar".to_string(),
            secret_access_key: "foobar".to_string(),
            bucket: "test".to_string(),
            ..S3Configuration::default()
        }
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(endpoint_url(&s3_config()), "http://127.0.0.1:9000");

        let secure = S3Configuration {
            use_ssl: true,
            ..s3_config()
        };
        assert_eq!(endpoint_url(&secure), "https://127.0.0.1:9000");
    }

    #[test]
    fn test_connect_requires_bucket() {
        let config = S3Configuration {
            bucket: String::new(),
            ..s3_config()
        };
        let error = S3Store::connect(&config).unwrap_err();
        assert!(matches!(error, ExporterError::Configuration { .. }));
    }

    #[test]
    fn test_connect_does_not_leak_secret() {
        let store = S3Store::connect(&s3_config()).unwrap();
        assert_eq!(store.bucket(), "test");
        assert_eq!(store.endpoint(), "http://127.0.0.1:9000");
        assert!(!format!("{:?}", store).contains("foobar"));
    }
}
