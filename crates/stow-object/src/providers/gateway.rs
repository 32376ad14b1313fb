//! S3-compatible gateway provider.
//!
//! Object traffic goes through [`object_store::aws::AmazonS3Builder`]; bucket
//! provisioning uses the MinIO client, since `object_store` has no bucket API.

use derive_more::Deref;
use minio::s3::creds::StaticProvider;
use minio::s3::http::BaseUrl;
use minio::s3::types::S3Api;
use object_store::aws::AmazonS3Builder;
use serde::{Deserialize, Serialize};

use super::Client;
use crate::TRACING_TARGET_PROVIDER;
use crate::client::ObjectStoreClient;
use crate::types::Error;

/// Typed credentials for an S3-compatible gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCredentials {
    /// Gateway endpoint URL (e.g. `https://gateway.example.io`).
    pub endpoint: String,
    /// Destination bucket.
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Signing region (defaults to `us-east-1`).
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Gateway-backed object storage client.
#[derive(Debug, Clone, Deref)]
pub struct GatewayProvider(ObjectStoreClient);

impl GatewayProvider {
    /// Consumes the provider, returning the underlying client.
    pub fn into_client(self) -> ObjectStoreClient {
        self.0
    }
}

impl Client for GatewayProvider {
    type Credentials = GatewayCredentials;

    const ID: &'static str = "gateway";

    async fn connect(creds: &Self::Credentials) -> Result<Self, Error> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&creds.bucket)
            .with_region(&creds.region)
            .with_endpoint(&creds.endpoint)
            .with_access_key_id(&creds.access_key_id)
            .with_secret_access_key(&creds.secret_access_key);

        if creds.endpoint.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| Error::connection(e.to_string(), Self::ID, false))?;

        Ok(Self(ObjectStoreClient::new(store)))
    }

    async fn ensure_bucket(creds: &Self::Credentials) -> Result<(), Error> {
        let base_url: BaseUrl = creds
            .endpoint
            .parse()
            .map_err(|e| Error::connection(format!("invalid endpoint: {e}"), Self::ID, false))?;
        let provider = StaticProvider::new(&creds.access_key_id, &creds.secret_access_key, None);
        let client = minio::s3::Client::new(base_url, Some(Box::new(provider)), None, None)
            .map_err(|e| Error::connection(e.to_string(), Self::ID, false))?;

        let exists = client
            .bucket_exists(&creds.bucket)
            .send()
            .await
            .map_err(|e| Error::connection(e.to_string(), Self::ID, false))?
            .exists;

        if exists {
            tracing::debug!(
                target: TRACING_TARGET_PROVIDER,
                bucket = %creds.bucket,
                "bucket already exists"
            );
            return Ok(());
        }

        client
            .create_bucket(&creds.bucket)
            .send()
            .await
            .map_err(|e| Error::connection(e.to_string(), Self::ID, false))?;

        tracing::info!(
            target: TRACING_TARGET_PROVIDER,
            bucket = %creds.bucket,
            "created bucket"
        );
        Ok(())
    }
}
