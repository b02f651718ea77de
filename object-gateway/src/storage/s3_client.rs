// S3/MinIO client implementation

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use futures::StreamExt;
use tracing::{debug, info};

use super::{ObjectStore, ObjectStream, StagedUpload, StorageError, StorageResult};
use crate::config::StorageConfig;

const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NoSuchBucket", "NotFound"];

/// Object store backed by an S3-compatible service
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Store {
    /// Create a new client from storage configuration.
    ///
    /// Static credentials are used when configured, otherwise the default
    /// AWS provider chain.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        info!("Initializing S3 client for bucket: {}", config.bucket);

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .operation_attempt_timeout(Duration::from_secs(config.operation_timeout_seconds))
            .build();

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "object-gateway");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(Region::new(config.region.clone()))
            }
            _ => {
                debug!("No static credentials configured, using default provider chain");
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&sdk_config)
            }
        };

        builder = builder
            .timeout_config(timeouts)
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!("S3 client initialized successfully");

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => match classify(err, &self.bucket) {
                StorageError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        info!("Creating bucket: {}", self.bucket);

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        // us-east-1 is the implicit location and must not be sent explicitly
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you())
                    .unwrap_or(false) =>
            {
                debug!("Bucket {} already owned by us", self.bucket);
                Ok(())
            }
            Err(err) => Err(classify(err, &self.bucket)),
        }
    }

    async fn list_objects(&self) -> StorageResult<Vec<String>> {
        debug!("Listing objects in bucket: {}", self.bucket);

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| classify(err, &self.bucket))?;
            names.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_string),
            );
        }

        debug!("Found {} objects in bucket {}", names.len(), self.bucket);
        Ok(names)
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectStream> {
        debug!("Opening object stream: {}/{}", self.bucket, key);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, key))?;

        let content_type = output.content_type().map(str::to_string);
        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());

        let body = futures::stream::try_unfold(output.body, |mut body| async move {
            let chunk = body
                .try_next()
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            Ok::<_, io::Error>(chunk.map(|bytes| (bytes, body)))
        })
        .boxed();

        Ok(ObjectStream {
            content_type,
            content_length,
            body,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        upload: StagedUpload,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!(
            "Uploading object {}/{} ({} bytes, {})",
            self.bucket,
            key,
            upload.size(),
            content_type
        );

        let body = ByteStream::from_path(upload.path())
            .await
            .map_err(|e| StorageError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        let content_length = i64::try_from(upload.size())
            .map_err(|_| StorageError::Backend(format!("object too large: {}", key)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_length(content_length)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| classify(err, key))?;

        info!("Object uploaded: {}/{}", self.bucket, key);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, key))?;

        info!("Object deleted: {}/{}", self.bucket, key);
        Ok(())
    }
}

/// Map an SDK failure onto the gateway's storage taxonomy
fn classify<E, R>(err: SdkError<E, R>, subject: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            return StorageError::BackendUnavailable(DisplayErrorContext(&err).to_string());
        }
        SdkError::ServiceError(service) => {
            let code = service.err().code().unwrap_or_default();
            if NOT_FOUND_CODES.contains(&code) {
                return StorageError::NotFound(subject.to_string());
            }
        }
        _ => {}
    }

    StorageError::Backend(DisplayErrorContext(&err).to_string())
}
