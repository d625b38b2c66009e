use async_trait::async_trait;
use aws_sdk_s3 as s3;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use s3::primitives::ByteStream;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Largest accepted image after base64 decoding (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_FOLDER: &str = "products";

/// StorageError
#[derive(Debug, Error)]
pub enum StorageError {
    /// The client sent something that cannot be stored. Surfaces as a 400.
    #[error("{0}")]
    InvalidPayload(String),

    #[error("object storage failure: {0}")]
    Backend(String),
}

/// StoredImage
///
/// Where an uploaded image can be fetched from, and the id used to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub url: String,
    pub file_id: String,
}

/// ImagePayload
///
/// A decoded upload, ready for the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

// 1. ImageStore Contract
/// ImageStore
///
/// Abstract contract for the image hosting collaborator. Handlers only see this
/// trait, so the S3 client in production and the in-memory mock in tests are
/// interchangeable.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Ensures the configured bucket exists. Only called in `Env::Local` to
    /// provision MinIO.
    async fn ensure_bucket_exists(&self);

    /// Stores `payload` under `key` and returns its public URL and file id.
    async fn put_image(&self, key: &str, payload: ImagePayload) -> Result<StoredImage, StorageError>;

    /// Removes a previously stored image.
    async fn delete_image(&self, file_id: &str) -> Result<(), StorageError>;
}

// 2. The Real Implementation (S3/MinIO)
/// S3ImageStore
///
/// Image hosting on any S3-compatible endpoint. Objects are addressed
/// path-style and exposed under `media_base_url`.
#[derive(Clone)]
pub struct S3ImageStore {
    client: s3::Client,
    bucket_name: String,
    media_base_url: String,
}

impl S3ImageStore {
    /// new
    ///
    /// Constructs the S3 client from the storage section of `AppConfig`.
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        media_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // MinIO and most gateways only support path-style addressing.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            media_base_url: media_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn put_image(&self, key: &str, payload: ImagePayload) -> Result<StoredImage, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(&payload.content_type)
            .body(ByteStream::from(payload.bytes))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(StoredImage {
            url: format!("{}/{}", self.media_base_url, key),
            file_id: key.to_string(),
        })
    }

    async fn delete_image(&self, file_id: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(file_id)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }
}

/// decode_image_payload
///
/// Accepts plain base64 or a `data:<mime>;base64,<payload>` URL. Rejects empty
/// payloads, invalid base64 and anything larger than `MAX_UPLOAD_BYTES`.
pub fn decode_image_payload(data: &str, file_name: &str) -> Result<ImagePayload, StorageError> {
    let data = data.trim();
    let (declared_type, encoded) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, encoded) = rest.split_once(',').ok_or_else(|| {
                StorageError::InvalidPayload("Malformed data URL".to_string())
            })?;
            let mime = header.split(';').next().unwrap_or_default();
            ((!mime.is_empty()).then(|| mime.to_string()), encoded)
        }
        None => (None, data),
    };

    // Reject before decoding when the encoded form alone is already too big.
    if encoded.len() / 4 * 3 > MAX_UPLOAD_BYTES + 3 {
        return Err(too_large());
    }

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| StorageError::InvalidPayload("Invalid base64 image data".to_string()))?;

    if bytes.is_empty() {
        return Err(StorageError::InvalidPayload("Image data is empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(too_large());
    }

    let content_type = declared_type.unwrap_or_else(|| content_type_for(file_name).to_string());
    Ok(ImagePayload {
        bytes,
        content_type,
    })
}

fn too_large() -> StorageError {
    StorageError::InvalidPayload("Image exceeds the 5 MB limit".to_string())
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// object_key
///
/// `{folder}/{uuid}-{file name}` with traversal segments removed from the
/// folder and anything outside `[A-Za-z0-9._-]` replaced in the file name.
pub fn object_key(folder: Option<&str>, file_name: &str) -> String {
    let folder = folder
        .map(sanitize_key)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FOLDER.to_string());

    let base_name = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut clean: String = base_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    clean = clean.trim_start_matches('.').to_string();
    if clean.is_empty() {
        clean = "upload".to_string();
    }

    format!("{}/{}-{}", folder, Uuid::new_v4(), clean)
}

/// sanitize_key
///
/// Prevents path traversal by removing empty, `.` and `..` segments from a
/// user-provided key segment.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockImageStore
///
/// Keeps the keys of stored objects in memory so tests can assert on uploads
/// and deletions without an object store.
#[derive(Default)]
pub struct MockImageStore {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Mutex<Vec<String>>,
}

impl MockImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys currently held by the mock.
    pub fn stored_keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.clone())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn ensure_bucket_exists(&self) {}

    async fn put_image(&self, key: &str, _payload: ImagePayload) -> Result<StoredImage, StorageError> {
        self.check()?;
        if let Ok(mut objects) = self.objects.lock() {
            objects.push(key.to_string());
        }
        Ok(StoredImage {
            url: format!("http://localhost:9000/mock-bucket/{}", key),
            file_id: key.to_string(),
        })
    }

    async fn delete_image(&self, file_id: &str) -> Result<(), StorageError> {
        self.check()?;
        if let Ok(mut objects) = self.objects.lock() {
            objects.retain(|key| key != file_id);
        }
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the image store across the application state.
pub type StorageState = Arc<dyn ImageStore>;
