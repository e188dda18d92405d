use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Presigned upload URLs stay valid for ten minutes.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Contract for the object store holding drive photos and food pictures. Implemented by
/// the S3 client (MinIO locally, Supabase Storage in production) and by an in-memory
/// mock for tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// get_presigned_upload_url
    ///
    /// Signed PUT URL for `key`, constrained to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;

    /// Removes the object at `key`. Deleting a missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), String>;

    /// Base URL objects are publicly served from, without a trailing slash.
    fn public_base(&self) -> &str;

    /// public_url
    ///
    /// The URL stored in the database for an uploaded object.
    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base().trim_end_matches('/'),
            sanitize_key(key)
        )
    }

    /// key_from_public_url
    ///
    /// Inverse of [`StorageService::public_url`]. `None` for URLs that do not point into
    /// this bucket, which are then left alone on delete.
    fn key_from_public_url(&self, url: &str) -> Option<String> {
        let base = self.public_base().trim_end_matches('/');
        let key = url.strip_prefix(base)?.strip_prefix('/')?;
        let key = key.split(['?', '#']).next().unwrap_or_default();
        let key = sanitize_key(key);
        (!key.is_empty()).then_some(key)
    }
}

/// S3StorageClient
///
/// `force_path_style(true)` is required by both MinIO and the Supabase S3 gateway.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket({}) returned: {}", self.bucket_name, e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL).map_err(|e| e.to_string())?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            // The client must send this exact Content-Type or the signature fails.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a client-supplied key cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-memory `StorageService` for tests. Records every deleted key so tests can assert
/// on blob cleanup.
#[derive(Clone)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    public_base: String,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl Default for MockStorageService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::with_public_base("http://localhost:9000/mock-bucket")
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn with_public_base(base: &str) -> Self {
        Self {
            should_fail: false,
            public_base: base.trim_end_matches('/').to_string(),
            deleted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Keys passed to `delete_object`, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        Ok(format!(
            "{}/{}?signature=fake",
            self.public_base,
            sanitize_key(key)
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }
        if let Ok(mut keys) = self.deleted.lock() {
            keys.push(sanitize_key(key));
        }
        Ok(())
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
