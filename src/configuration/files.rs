//! File access used by configuration sources and editors

use crate::core::errors::FileError;
use crate::core::resources;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use url::Url;

/// Kind of an existing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub is_directory: bool,
}

impl FileStat {
    pub fn file() -> Self {
        Self {
            is_file: true,
            is_directory: false,
        }
    }

    pub fn directory() -> Self {
        Self {
            is_file: false,
            is_directory: true,
        }
    }
}

/// Reads, writes and probes resources
#[async_trait]
pub trait FileService: Send + Sync {
    /// Stat a resource; fails with [`FileError::NotFound`] when it does not exist
    async fn resolve(&self, resource: &Url) -> Result<FileStat, FileError>;

    async fn read_file(&self, resource: &Url) -> Result<String, FileError>;

    /// Write a whole file, creating parent directories as needed
    async fn write_file(&self, resource: &Url, content: &str) -> Result<(), FileError>;
}

/// `file://` resources on the local disk
#[derive(Debug, Default, Clone)]
pub struct DiskFileService;

impl DiskFileService {
    pub fn new() -> Self {
        Self
    }

    fn to_path(resource: &Url) -> Result<PathBuf, FileError> {
        if resource.scheme() != "file" {
            return Err(FileError::UnsupportedScheme {
                scheme: resource.scheme().to_string(),
                resource: resource.clone(),
            });
        }
        resource.to_file_path().map_err(|_| FileError::InvalidPath {
            path: resource.to_string(),
        })
    }
}

#[async_trait]
impl FileService for DiskFileService {
    async fn resolve(&self, resource: &Url) -> Result<FileStat, FileError> {
        let path = Self::to_path(resource)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(FileStat {
                is_file: metadata.is_file(),
                is_directory: metadata.is_dir(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FileError::NotFound {
                resource: resource.clone(),
            }),
            Err(e) => Err(FileError::read_error(resource.clone(), e)),
        }
    }

    async fn read_file(&self, resource: &Url) -> Result<String, FileError> {
        let path = Self::to_path(resource)?;
        debug!("Reading {}", path.display());
        fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FileError::NotFound {
                    resource: resource.clone(),
                }
            } else {
                FileError::read_error(resource.clone(), e)
            }
        })
    }

    async fn write_file(&self, resource: &Url, content: &str) -> Result<(), FileError> {
        let path = Self::to_path(resource)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FileError::write_error(resource.clone(), e))?;
        }
        debug!("Writing {}", path.display());
        fs::write(&path, content)
            .await
            .map_err(|e| FileError::write_error(resource.clone(), e))
    }
}

/// In-memory file system for embedding and tests
#[derive(Debug, Default)]
pub struct InMemoryFileService {
    files: DashMap<Url, String>,
    directories: DashSet<Url>,
}

impl InMemoryFileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_directory(&self, resource: &Url) {
        self.directories.insert(resources::normalize(resource));
    }

    /// Contents of a file, if present
    pub fn contents(&self, resource: &Url) -> Option<String> {
        self.files
            .get(&resources::normalize(resource))
            .map(|entry| entry.value().clone())
    }

    pub fn delete(&self, resource: &Url) {
        self.files.remove(&resources::normalize(resource));
    }

    fn is_directory(&self, resource: &Url) -> bool {
        self.directories.contains(resource)
            || self
                .files
                .iter()
                .any(|entry| !resources::is_equal(entry.key(), resource) && resources::is_equal_or_parent(entry.key(), resource))
    }
}

#[async_trait]
impl FileService for InMemoryFileService {
    async fn resolve(&self, resource: &Url) -> Result<FileStat, FileError> {
        let resource = resources::normalize(resource);
        if self.files.contains_key(&resource) {
            Ok(FileStat::file())
        } else if self.is_directory(&resource) {
            Ok(FileStat::directory())
        } else {
            Err(FileError::NotFound { resource })
        }
    }

    async fn read_file(&self, resource: &Url) -> Result<String, FileError> {
        let normalized = resources::normalize(resource);
        if let Some(content) = self.files.get(&normalized) {
            return Ok(content.value().clone());
        }
        if self.is_directory(&normalized) {
            return Err(FileError::NotAFile { resource: normalized });
        }
        Err(FileError::NotFound { resource: normalized })
    }

    async fn write_file(&self, resource: &Url, content: &str) -> Result<(), FileError> {
        let resource = resources::normalize(resource);
        if self.directories.contains(&resource) {
            return Err(FileError::NotAFile { resource });
        }
        self.files.insert(resource, content.to_string());
        Ok(())
    }
}
