use std::env;
use std::fmt::Debug;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use bytes::Bytes;

use super::{ByteStream, ListingPage, ObjectBackend};
use crate::{BackendError, BackendResult};

/// Connection settings for an S3-compatible service
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Path-style addressing, needed by most self-hosted S3 implementations
    pub force_path_style: bool,
    /// Keys per listing call, service default when unset
    pub page_size: Option<i32>,
}

impl S3Config {
    /// Read settings from `DOG_DATASTORE_S3_*` environment variables.
    ///
    /// Without static keys the default AWS credential chain applies.
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).ok().filter(|value| !value.is_empty());
        let endpoint_url = var("DOG_DATASTORE_S3_ENDPOINT");
        Self {
            region: var("DOG_DATASTORE_S3_REGION"),
            force_path_style: endpoint_url.is_some(),
            endpoint_url,
            access_key_id: var("DOG_DATASTORE_S3_ACCESS_KEY_ID"),
            secret_access_key: var("DOG_DATASTORE_S3_SECRET_ACCESS_KEY"),
            page_size: var("DOG_DATASTORE_S3_PAGE_SIZE").and_then(|value| value.parse().ok()),
        }
    }
}

/// Object storage on an S3-compatible service; containers map to buckets
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    page_size: Option<i32>,
}

impl S3Backend {
    /// Wrap an already configured client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page_size: None,
        }
    }

    /// Build a client from connection settings
    pub async fn connect(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint_url) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (config.access_key_id, config.secret_access_key)
        {
            let credentials =
                Credentials::new(access_key_id, secret_access_key, None, None, "dog-datastore");
            loader = loader.credentials_provider(credentials);
        }
        let aws_config = loader.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        );
        Self {
            client,
            page_size: config.page_size,
        }
    }

    /// Request at most `page_size` keys per listing call
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn map_sdk_error<E, R>(err: SdkError<E, R>) -> BackendError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
        R: Debug + Send + Sync + 'static,
    {
        let code = err.code().unwrap_or("Unknown").to_string();
        BackendError::service(code, err)
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn create_container_if_missing(&self, container: &str) -> BackendResult<()> {
        let head = self.client.head_bucket().bucket(container).send().await;
        match head {
            Ok(_) => return Ok(()),
            Err(err) if err.as_service_error().map_or(false, |e| e.is_not_found()) => {}
            Err(err) => return Err(Self::map_sdk_error(err)),
        }

        match self.client.create_bucket().bucket(container).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err.as_service_error().map_or(false, |e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                }) =>
            {
                Ok(())
            }
            Err(err) => Err(Self::map_sdk_error(err)),
        }
    }

    async fn write_object(&self, container: &str, id: &str, data: Bytes) -> BackendResult<()> {
        self.client
            .put_object()
            .bucket(container)
            .key(id)
            .body(AwsByteStream::from(data))
            .send()
            .await
            .map_err(Self::map_sdk_error)?;
        Ok(())
    }

    async fn read_object(&self, container: &str, id: &str) -> BackendResult<ByteStream> {
        let result = self
            .client
            .get_object()
            .bucket(container)
            .key(id)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) if err.as_service_error().map_or(false, |e| e.is_no_such_key()) => {
                return Err(BackendError::not_found(id));
            }
            Err(err) => return Err(Self::map_sdk_error(err)),
        };

        let mut body = output.body;
        let stream = async_stream::stream! {
            while let Some(chunk) = body.next().await {
                yield chunk.map_err(std::io::Error::from);
            }
        };
        Ok(Box::pin(stream))
    }

    async fn object_exists(&self, container: &str, id: &str) -> BackendResult<bool> {
        let result = self
            .client
            .head_object()
            .bucket(container)
            .key(id)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().map_or(false, |e| e.is_not_found()) => Ok(false),
            Err(err) => Err(Self::map_sdk_error(err)),
        }
    }

    async fn delete_object(&self, container: &str, id: &str) -> BackendResult<()> {
        let result = self
            .client
            .delete_object()
            .bucket(container)
            .key(id)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // S3 deletes are idempotent, but some compatible services still report this
            Err(err) if err.code() == Some("NoSuchKey") => Ok(()),
            Err(err) => Err(Self::map_sdk_error(err)),
        }
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        token: Option<&str>,
    ) -> BackendResult<ListingPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(container)
            .prefix(prefix)
            .set_continuation_token(token.map(str::to_string))
            .set_max_keys(self.page_size)
            .send()
            .await
            .map_err(Self::map_sdk_error)?;

        let entries = response
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| object.key)
            .collect();

        Ok(ListingPage::new(entries, response.next_continuation_token))
    }
}
