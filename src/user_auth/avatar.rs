//! Avatar delegate: stores profile images and hands back an opaque reference.
//!
//! Two interchangeable strategies, picked by configuration:
//! - [`RemoteAvatarStore`] forwards bytes to the storage service
//!   (`POST {base}/api/storage/upload_avatar`).
//! - [`LocalAvatarStore`] writes files under one server-local directory and
//!   serves them back.
//!
//! Every store call generates a fresh `<uuid>.<ext>` name; nothing is ever
//! overwritten.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::error::AvatarError;
use crate::config::{AvatarConfig, AvatarStrategy};

/// Image extensions accepted for upload and serving.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["webp", "jpg", "png"];

/// Resolve the allow-listed extension of a file name (case-insensitive).
pub fn allowed_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.into_iter().find(|allowed| *allowed == ext)
}

/// MIME type for an allow-listed extension.
pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "webp" => "image/webp",
        "jpg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Generate a collision-resistant reference for an upload.
pub fn new_reference(original_name: &str) -> Result<String, AvatarError> {
    let ext = allowed_extension(original_name).ok_or(AvatarError::UnsupportedFormat)?;
    Ok(format!("{}.{}", Uuid::new_v4(), ext))
}

/// Validate a caller-supplied reference before it is turned into a path.
///
/// Rejects path separators, parent/self segments and NUL, then requires an
/// allow-listed extension. Returns that extension.
pub fn check_reference(reference: &str) -> Result<&'static str, AvatarError> {
    if reference.is_empty()
        || reference.contains(['/', '\\', '\0'])
        || reference == "."
        || reference.contains("..")
    {
        return Err(AvatarError::Forbidden);
    }
    allowed_extension(reference).ok_or(AvatarError::Forbidden)
}

/// A stored image read back for serving.
#[derive(Debug)]
pub struct AvatarFile {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AvatarDelegate: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Persist `bytes` and return the new reference.
    async fn store(&self, bytes: Vec<u8>, original_name: &str) -> Result<String, AvatarError>;

    /// Read a stored image back.
    async fn serve(&self, reference: &str) -> Result<AvatarFile, AvatarError>;

    /// Drop a reference that will not be used. Missing references are not an error.
    async fn discard(&self, reference: &str) -> Result<(), AvatarError>;
}

/// Build the configured strategy.
pub async fn from_config(config: &AvatarConfig) -> Result<Arc<dyn AvatarDelegate>, AvatarError> {
    match config.strategy {
        AvatarStrategy::Local => {
            let store = LocalAvatarStore::open(&config.local_dir).await?;
            tracing::info!(dir = %config.local_dir.display(), "avatar strategy: local");
            Ok(Arc::new(store))
        }
        AvatarStrategy::Remote => {
            let base_url = config.storage_service_url.as_deref().unwrap_or_default();
            let store = RemoteAvatarStore::new(
                base_url,
                Duration::from_secs(config.upload_timeout_secs),
            )?;
            tracing::info!(base_url, "avatar strategy: remote");
            Ok(Arc::new(store))
        }
    }
}

// ============================================================================
// Local disk
// ============================================================================

pub struct LocalAvatarStore {
    dir: PathBuf,
}

impl LocalAvatarStore {
    /// Use `dir` as the avatar directory, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AvatarError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl AvatarDelegate for LocalAvatarStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn store(&self, bytes: Vec<u8>, original_name: &str) -> Result<String, AvatarError> {
        let reference = new_reference(original_name)?;
        let path = self.dir.join(&reference);

        let write = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await?;
            file.write_all(&bytes).await?;
            file.flush().await
        };
        if let Err(e) = write.await {
            // Do not leave a truncated file behind
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AvatarError::UploadFailure(e.to_string()));
        }

        Ok(reference)
    }

    async fn serve(&self, reference: &str) -> Result<AvatarFile, AvatarError> {
        let ext = check_reference(reference)?;
        match tokio::fs::read(self.dir.join(reference)).await {
            Ok(bytes) => Ok(AvatarFile {
                content_type: content_type(ext),
                bytes,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AvatarError::NotFound),
            Err(e) => Err(AvatarError::Io(e)),
        }
    }

    async fn discard(&self, reference: &str) -> Result<(), AvatarError> {
        check_reference(reference)?;
        match tokio::fs::remove_file(self.dir.join(reference)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AvatarError::Io(e)),
        }
    }
}

// ============================================================================
// Remote storage service
// ============================================================================

pub struct RemoteAvatarStore {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteAvatarStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AvatarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AvatarError::UploadFailure(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_checked(&self, request: reqwest::RequestBuilder) -> Result<(), AvatarError> {
        let response = request
            .send()
            .await
            .map_err(|e| AvatarError::UploadFailure(format!("storage request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(AvatarError::UploadFailure(format!(
                "storage returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AvatarDelegate for RemoteAvatarStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn store(&self, bytes: Vec<u8>, original_name: &str) -> Result<String, AvatarError> {
        let reference = new_reference(original_name)?;
        let ext = allowed_extension(&reference).unwrap_or_default();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(reference.clone())
            .mime_str(content_type(ext))
            .map_err(|e| AvatarError::UploadFailure(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/api/storage/upload_avatar", self.base_url);
        self.post_checked(self.client.post(url).multipart(form))
            .await?;

        Ok(reference)
    }

    async fn serve(&self, reference: &str) -> Result<AvatarFile, AvatarError> {
        // Images live with the storage service; nothing is served locally.
        check_reference(reference)?;
        Err(AvatarError::NotFound)
    }

    async fn discard(&self, reference: &str) -> Result<(), AvatarError> {
        check_reference(reference)?;
        let url = format!("{}/api/storage/delete_avatar", self.base_url);
        let payload = serde_json::json!({ "filename": reference });
        self.post_checked(self.client.post(url).json(&payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Multipart, State},
        http::StatusCode,
        routing::post,
    };
    use std::sync::Mutex;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("me.png"), Some("png"));
        assert_eq!(allowed_extension("ME.JPG"), Some("jpg"));
        assert_eq!(allowed_extension("a.b.webp"), Some("webp"));
        assert_eq!(allowed_extension("me.gif"), None);
        assert_eq!(allowed_extension("me.jpeg"), None);
        assert_eq!(allowed_extension("noext"), None);
        assert_eq!(allowed_extension(""), None);
    }

    #[test]
    fn test_new_reference() {
        let a = new_reference("face.PNG").unwrap();
        let b = new_reference("face.PNG").unwrap();
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
        assert!(matches!(
            new_reference("script.sh"),
            Err(AvatarError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_check_reference_rejects_traversal() {
        assert_eq!(check_reference("abc.png").unwrap(), "png");
        for bad in [
            "../../etc/passwd",
            "../secret.png",
            "dir/a.png",
            "dir\\a.png",
            "..",
            ".",
            "",
            "a\0.png",
            "passwd",
            "a.exe",
        ] {
            assert!(
                matches!(check_reference(bad), Err(AvatarError::Forbidden)),
                "{:?} should be forbidden",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_local_store_serve_discard() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAvatarStore::open(dir.path().join("avatars"))
            .await
            .unwrap();

        let reference = store.store(b"png-bytes".to_vec(), "me.png").await.unwrap();
        assert!(store.dir().join(&reference).exists());

        let file = store.serve(&reference).await.unwrap();
        assert_eq!(file.bytes, b"png-bytes");
        assert_eq!(file.content_type, "image/png");

        store.discard(&reference).await.unwrap();
        assert!(matches!(
            store.serve(&reference).await,
            Err(AvatarError::NotFound)
        ));
        // Idempotent
        store.discard(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_store_rejects_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAvatarStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.store(b"x".to_vec(), "me.gif").await,
            Err(AvatarError::UnsupportedFormat)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_local_store_never_serves_outside_dir() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("secret.png"), b"secret").unwrap();
        let store = LocalAvatarStore::open(root.path().join("avatars"))
            .await
            .unwrap();
        assert!(matches!(
            store.serve("../secret.png").await,
            Err(AvatarError::Forbidden)
        ));
    }

    // Fake storage service recording uploaded file names
    #[derive(Clone, Default)]
    struct FakeStorage {
        uploads: Arc<Mutex<Vec<String>>>,
        deletes: Arc<Mutex<Vec<String>>>,
    }

    async fn fake_upload(
        State(fake): State<FakeStorage>,
        mut multipart: Multipart,
    ) -> StatusCode {
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some("file") {
                let name = field.file_name().unwrap_or_default().to_string();
                fake.uploads.lock().unwrap().push(name);
            }
        }
        StatusCode::CREATED
    }

    async fn fake_delete(
        State(fake): State<FakeStorage>,
        Json(body): Json<serde_json::Value>,
    ) -> StatusCode {
        let name = body["filename"].as_str().unwrap_or_default().to_string();
        fake.deletes.lock().unwrap().push(name);
        StatusCode::OK
    }

    async fn failing_upload() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_remote_store_uploads_generated_name() {
        let fake = FakeStorage::default();
        let app = Router::new()
            .route("/api/storage/upload_avatar", post(fake_upload))
            .route("/api/storage/delete_avatar", post(fake_delete))
            .with_state(fake.clone());
        let base = spawn(app).await;

        let store = RemoteAvatarStore::new(&base, Duration::from_secs(5)).unwrap();
        let reference = store.store(b"img".to_vec(), "me.webp").await.unwrap();
        assert!(reference.ends_with(".webp"));
        assert_eq!(*fake.uploads.lock().unwrap(), vec![reference.clone()]);

        store.discard(&reference).await.unwrap();
        assert_eq!(*fake.deletes.lock().unwrap(), vec![reference]);
    }

    #[tokio::test]
    async fn test_remote_store_non_success_is_upload_failure() {
        let app = Router::new().route("/api/storage/upload_avatar", post(failing_upload));
        let base = spawn(app).await;

        let store = RemoteAvatarStore::new(&base, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            store.store(b"img".to_vec(), "me.png").await,
            Err(AvatarError::UploadFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_store_unreachable_is_upload_failure() {
        // Reserve a port, then close it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store =
            RemoteAvatarStore::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            store.store(b"img".to_vec(), "me.png").await,
            Err(AvatarError::UploadFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_store_rejects_format_without_request() {
        let store = RemoteAvatarStore::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            store.store(b"img".to_vec(), "me.bmp").await,
            Err(AvatarError::UnsupportedFormat)
        ));
        assert!(matches!(
            store.serve("a.png").await,
            Err(AvatarError::NotFound)
        ));
    }
}
