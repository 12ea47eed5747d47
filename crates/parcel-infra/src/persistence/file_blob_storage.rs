//! Content-addressed photo storage on the local filesystem

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use parcel_domain::repository::BlobStorage;
use parcel_types::{Error, StorageId, StoreError, UploadUrl};
use sha2::{Digest, Sha256};
use tracing::debug;

const URL_PREFIX: &str = "file-upload://";

/// Stores each blob as `<sha256>.bin` under a root directory.
///
/// Upload URLs are one-shot: each one accepts a single upload.
pub struct FileBlobStorage {
    root: PathBuf,
    pending: Mutex<HashSet<String>>,
}

impl FileBlobStorage {
    pub fn open(root: PathBuf) -> Result<Self, Error> {
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            pending: Mutex::new(HashSet::new()),
        })
    }

    /// Compute the storage id for a blob
    pub fn content_id(bytes: &[u8]) -> StorageId {
        StorageId(format!("{:x}", Sha256::digest(bytes)))
    }

    fn blob_path(&self, id: &StorageId) -> Result<PathBuf, Error> {
        let valid = id.0.len() == 64 && id.0.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(StoreError::BlobNotFound(id.to_string()).into());
        }
        Ok(self.root.join(format!("{}.bin", id.0)))
    }

    fn take_pending(&self, url: &UploadUrl) -> Result<bool, Error> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| Error::Upload("upload registry lock poisoned".to_string()))?;
        Ok(pending.remove(&url.0))
    }
}

impl BlobStorage for FileBlobStorage {
    fn generate_upload_url(&self) -> Result<UploadUrl, Error> {
        let url = format!("{}{}", URL_PREFIX, uuid::Uuid::new_v4());
        self.pending
            .lock()
            .map_err(|_| Error::Upload("upload registry lock poisoned".to_string()))?
            .insert(url.clone());
        Ok(UploadUrl(url))
    }

    fn upload(&self, url: &UploadUrl, bytes: &[u8]) -> Result<StorageId, Error> {
        if bytes.is_empty() {
            return Err(Error::Upload("refusing to store an empty photo".to_string()));
        }
        if !self.take_pending(url)? {
            return Err(Error::Upload(format!("unknown or used upload url: {}", url)));
        }

        let id = Self::content_id(bytes);
        let path = self.blob_path(&id)?;
        if !path.exists() {
            let tmp_path = path.with_extension("bin.tmp");
            fs::write(&tmp_path, bytes).map_err(|e| Error::Upload(e.to_string()))?;
            fs::rename(&tmp_path, &path).map_err(|e| Error::Upload(e.to_string()))?;
        }
        debug!(id = %id, size = bytes.len(), "photo stored");
        Ok(id)
    }

    fn fetch(&self, id: &StorageId) -> Result<Vec<u8>, Error> {
        let path = self.blob_path(id)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::BlobNotFound(id.to_string()).into(),
            _ => Error::Io(e),
        })
    }
}
