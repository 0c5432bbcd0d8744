use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};

#[derive(Error, Debug)]
pub enum FileStoreError {
    #[error("File {0} not found")]
    Missing(String),
    #[error("Unable to {action} file {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FileStoreError {
    fn io(action: &'static str, path: &Path, source: std::io::Error) -> FileStoreError {
        let path = path.to_string_lossy().into_owned();
        if source.kind() == ErrorKind::NotFound {
            FileStoreError::Missing(path)
        } else {
            FileStoreError::Io {
                action,
                path,
                source,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Document,
    Invoice,
}

impl FileKind {
    fn directory(self) -> &'static str {
        match self {
            FileKind::Document => "documents",
            FileKind::Invoice => "invoices",
        }
    }
}

/// An uploaded file held in memory until it is stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl Upload {
    pub fn new(original_name: impl Into<String>, content: Vec<u8>) -> Upload {
        Upload {
            original_name: original_name.into(),
            content_type: None,
            content,
        }
    }

    pub fn size(&self) -> i64 {
        self.content.len() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub size: i64,
}

/// What to do when removing an entity's file fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCleanup {
    /// Log the failure and carry on.
    BestEffort,
    /// Propagate the failure, including a file that is already gone.
    Required,
}

impl FileCleanup {
    pub async fn remove(self, store: &FileStore, path: &str) -> Result<(), FileStoreError> {
        match self {
            FileCleanup::BestEffort => {
                store.discard(path).await;
                Ok(())
            }
            FileCleanup::Required => store.delete(path).await,
        }
    }
}

/// Files live under `<root>/documents` and `<root>/invoices`, named by id plus
/// the extension of the uploaded file.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> FileStore {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage directories. Safe to call more than once.
    pub async fn init(&self) -> Result<(), FileStoreError> {
        for kind in [FileKind::Document, FileKind::Invoice] {
            let dir = self.root.join(kind.directory());
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| FileStoreError::io("create directory", &dir, e))?;
        }
        Ok(())
    }

    pub fn path_for(&self, kind: FileKind, id: &str, original_name: &str) -> PathBuf {
        let file_name = match Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some(ext) if !ext.is_empty() => format!("{}.{}", id, ext),
            _ => id.to_string(),
        };
        self.root.join(kind.directory()).join(file_name)
    }

    #[instrument(skip(self, upload), fields(original_name = %upload.original_name, size = upload.content.len()))]
    pub async fn save(
        &self,
        kind: FileKind,
        id: &str,
        upload: &Upload,
    ) -> Result<StoredFile, FileStoreError> {
        let path = self.path_for(kind, id, &upload.original_name);

        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| FileStoreError::io("create", &path, e))?;
        file.write_all(&upload.content)
            .await
            .map_err(|e| FileStoreError::io("write", &path, e))?;
        file.sync_all()
            .await
            .map_err(|e| FileStoreError::io("sync", &path, e))?;

        Ok(StoredFile {
            path: path.to_string_lossy().into_owned(),
            size: upload.size(),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<(), FileStoreError> {
        let path = Path::new(path);
        fs::remove_file(path)
            .await
            .map_err(|e| FileStoreError::io("delete", path, e))
    }

    /// Removes a file nothing refers to any more. Failures are only logged.
    pub async fn discard(&self, path: &str) {
        if let Err(err) = self.delete(path).await {
            warn!(%path, %err, "Unable to remove file");
        }
    }

    pub async fn exists(&self, path: &str) -> Result<bool, FileStoreError> {
        let path = Path::new(path);
        match fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FileStoreError::io("inspect", path, e)),
        }
    }
}
