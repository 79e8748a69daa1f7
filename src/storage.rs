//! Blob storage for photos, receipts and payment screenshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const RECEIPT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Logical folder an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobCategory {
    ProjectPhotos,
    Receipts,
    PaymentScreenshots,
    CheckIns,
    CheckOuts,
}

impl BlobCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobCategory::ProjectPhotos => "project-photos",
            BlobCategory::Receipts => "receipts",
            BlobCategory::PaymentScreenshots => "payment-screenshots",
            BlobCategory::CheckIns => "check-ins",
            BlobCategory::CheckOuts => "check-outs",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            BlobCategory::Receipts => RECEIPT_EXTENSIONS,
            _ => IMAGE_EXTENSIONS,
        }
    }
}

/// A validated file ready to be stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub extension: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Checks size and extension against the category's rules.
    pub fn new(category: BlobCategory, file_name: &str, bytes: Vec<u8>) -> AppResult<Self> {
        if bytes.is_empty() {
            return Err(AppError::validation("uploaded file is empty"));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::validation("file size exceeds 5MB limit"));
        }

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !category.allowed_extensions().contains(&extension.as_str()) {
            return Err(AppError::validation(format!(
                "unsupported file type; allowed: {}",
                category.allowed_extensions().join(", ")
            )));
        }

        let content_type = match extension.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "image/jpeg",
        }
        .to_string();

        Ok(Self {
            extension,
            content_type,
            bytes,
        })
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the upload and returns its public URL.
    async fn put(&self, category: BlobCategory, upload: Upload) -> AppResult<String>;
}

fn object_name(category: BlobCategory, upload: &Upload) -> String {
    format!("{}/{}.{}", category.as_str(), Uuid::new_v4(), upload.extension)
}

/// Files under a local directory, served back under `public_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, category: BlobCategory, upload: Upload) -> AppResult<String> {
        let name = object_name(category, &upload);
        let path = self.root.join(&name);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::dependency(format!("failed to prepare upload dir: {err}")))?;
        }
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|err| AppError::dependency(format!("failed to store upload: {err}")))?;

        tracing::debug!(path = %path.display(), "stored upload");
        Ok(format!("{}/{}", self.public_url, name))
    }
}

/// Supabase storage bucket over its REST API.
#[derive(Clone)]
pub struct SupabaseBlobStore {
    client: reqwest::Client,
    url: String,
    key: String,
    bucket: String,
}

impl SupabaseBlobStore {
    pub fn new(url: &str, key: &str, bucket: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AppError::configuration(format!("failed to build storage client: {err}")))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    async fn put(&self, category: BlobCategory, upload: Upload) -> AppResult<String> {
        let name = object_name(category, &upload);
        let endpoint = format!("{}/storage/v1/object/{}/{}", self.url, self.bucket, name);

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.key)
            .header(reqwest::header::CONTENT_TYPE, &upload.content_type)
            .body(upload.bytes)
            .send()
            .await
            .map_err(|err| AppError::dependency(format!("storage request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::dependency(format!("storage upload failed ({status}): {body}")));
        }

        Ok(format!("{}/storage/v1/object/public/{}/{}", self.url, self.bucket, name))
    }
}

pub fn from_config(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config {
        StorageConfig::Local { dir, public_url } => Arc::new(LocalBlobStore::new(dir.clone(), public_url.clone())),
        StorageConfig::Supabase { url, key, bucket } => Arc::new(SupabaseBlobStore::new(url, key, bucket)?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_extension_and_oversized_files() {
        assert!(Upload::new(BlobCategory::ProjectPhotos, "plan.pdf", vec![1]).is_err());
        assert!(Upload::new(BlobCategory::ProjectPhotos, "noext", vec![1]).is_err());
        assert!(Upload::new(BlobCategory::ProjectPhotos, "big.png", vec![0; MAX_UPLOAD_BYTES + 1]).is_err());
        assert!(Upload::new(BlobCategory::ProjectPhotos, "empty.png", Vec::new()).is_err());
    }

    #[test]
    fn receipts_accept_more_formats() {
        assert!(Upload::new(BlobCategory::ProjectPhotos, "r.webp", vec![1]).is_err());
        let upload = Upload::new(BlobCategory::Receipts, "R.WEBP", vec![1]).unwrap();
        assert_eq!(upload.extension, "webp");
        assert_eq!(upload.content_type, "image/webp");
    }

    #[tokio::test]
    async fn local_store_writes_under_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://files.test/uploads/");
        let upload = Upload::new(BlobCategory::Receipts, "receipt.jpg", b"jpeg".to_vec()).unwrap();

        let url = store.put(BlobCategory::Receipts, upload).await.unwrap();
        assert!(url.starts_with("http://files.test/uploads/receipts/"));
        assert!(url.ends_with(".jpg"));

        let name = url.trim_start_matches("http://files.test/uploads/");
        assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), b"jpeg");
    }
}
