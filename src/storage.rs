use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};
use uuid::Uuid;

// 1. ResumeStorage Contract
/// ResumeStorage
///
/// Where uploaded resumes go. The handler hands over the raw bytes and stores the
/// returned location in `applications.resume_url`; the database never holds file content.
#[async_trait]
pub trait ResumeStorage: Send + Sync {
    /// Persists `data` and returns the stored file's path.
    ///
    /// # Arguments
    /// * `original_name`: The client-supplied filename, used only for its extension.
    /// * `data`: The file content.
    async fn store(&self, original_name: Option<&str>, data: &[u8]) -> Result<String>;

    /// Deletes a file previously returned by `store`. Used to drop the resume of an
    /// application that was never recorded.
    async fn remove(&self, location: &str) -> Result<()>;
}

/// stored_file_name
///
/// Builds a collision-free file name (`<uuid>.<ext>`) from the client's filename.
/// The extension is lower-cased and stripped to ASCII alphanumerics, so nothing the
/// client sends can introduce path separators or `..` segments.
pub fn stored_file_name(original_name: Option<&str>) -> String {
    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(std::ffi::OsStr::to_str)
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .take(16)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string());

    format!("{}.{}", Uuid::new_v4().simple(), extension)
}

// 2. The Real Implementation (shared filesystem)
/// LocalDiskStorage
///
/// Writes resumes under a configured directory, creating it on demand.
#[derive(Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ResumeStorage for LocalDiskStorage {
    async fn store(&self, original_name: Option<&str>, data: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self.root.join(stored_file_name(original_name));
        tokio::fs::write(&path, data).await.inspect_err(|e| {
            tracing::error!("Failed to write resume to {}: {}", path.display(), e);
        })?;

        tracing::debug!(bytes = data.len(), path = %path.display(), "resume stored");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn remove(&self, location: &str) -> Result<()> {
        tokio::fs::remove_file(location).await?;
        tracing::debug!(path = location, "resume removed");
        Ok(())
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// A mock implementation of `ResumeStorage` that writes nothing and returns a
/// deterministic-looking `uploads/mock-…` path, so handler tests need no filesystem.
/// It remembers which locations are currently "stored".
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Locations stored and not yet removed.
    pub fn stored_locations(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.stored
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ResumeStorage for MockStorageService {
    async fn store(&self, original_name: Option<&str>, _data: &[u8]) -> Result<String> {
        if self.should_fail {
            return Err(AppError::Internal(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        let location = format!("uploads/mock-{}", stored_file_name(original_name));
        self.lock().push(location.clone());
        Ok(location)
    }

    async fn remove(&self, location: &str) -> Result<()> {
        if self.should_fail {
            return Err(AppError::Internal(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        self.lock().retain(|stored| stored != location);
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share resume storage across the application state.
pub type StorageState = Arc<dyn ResumeStorage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_a_clean_lowercase_extension() {
        let name = stored_file_name(Some("My Resume.PDF"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), 32 + ".pdf".len());
    }

    #[test]
    fn falls_back_to_bin() {
        assert!(stored_file_name(None).ends_with(".bin"));
        assert!(stored_file_name(Some("resume")).ends_with(".bin"));
        assert!(stored_file_name(Some("resume.../")).ends_with(".bin"));
    }

    #[test]
    fn never_produces_path_segments() {
        let name = stored_file_name(Some("../../etc/passwd.p/../df"));
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[tokio::test]
    async fn local_disk_storage_writes_the_bytes() {
        let root = std::env::temp_dir().join(format!("job-board-test-{}", Uuid::new_v4()));
        let storage = LocalDiskStorage::new(&root);

        let stored = storage.store(Some("cv.pdf"), b"%PDF-1.4").await.unwrap();

        assert!(stored.ends_with(".pdf"));
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"%PDF-1.4");
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn local_disk_storage_removes_what_it_stored() {
        let root = std::env::temp_dir().join(format!("job-board-test-{}", Uuid::new_v4()));
        let storage = LocalDiskStorage::new(&root);

        let stored = storage.store(Some("cv.pdf"), b"%PDF-1.4").await.unwrap();
        storage.remove(&stored).await.unwrap();

        assert!(!Path::new(&stored).exists());
        assert!(storage.remove(&stored).await.is_err());
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn mock_tracks_stored_locations() {
        let mock = MockStorageService::new();
        let first = mock.store(Some("a.pdf"), b"x").await.unwrap();
        let second = mock.store(Some("b.pdf"), b"y").await.unwrap();

        mock.remove(&first).await.unwrap();
        assert_eq!(mock.stored_locations(), vec![second]);
    }

    #[tokio::test]
    async fn mock_failure() {
        let mock = MockStorageService::new_failing();
        assert!(mock.store(Some("cv.pdf"), b"x").await.is_err());
    }
}
