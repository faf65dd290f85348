//! A [crate::Storage] backed by the local filesystem.
//!
//! Each partition is a directory beneath [Config::storage_directory] and each blob is a
//! regular file within it. Blobs use positional I/O (`pread`/`pwrite` on unix) on a shared
//! file handle, so clones of a blob can be read concurrently without coordination.

use crate::Error;
use std::{
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

/// Configuration for [Storage].
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory under which all partitions are stored.
    pub storage_directory: PathBuf,
}

impl Config {
    pub fn new(storage_directory: PathBuf) -> Self {
        Self { storage_directory }
    }
}

/// Filesystem-backed storage.
#[derive(Clone)]
pub struct Storage {
    cfg: Config,
}

impl Storage {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    fn partition_path(&self, partition: &str) -> Result<PathBuf, Error> {
        super::validate_partition_name(partition)?;
        Ok(self.cfg.storage_directory.join(partition))
    }

    fn blob_path(&self, partition: &str, name: &str) -> Result<PathBuf, Error> {
        super::validate_blob_name(name)?;
        Ok(self.partition_path(partition)?.join(name))
    }
}

/// Sync a directory so that entries created within it are durable.
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<(), std::io::Error> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_: &Path) -> Result<(), std::io::Error> {
    Ok(())
}

/// Create `path` and any missing ancestors, syncing the parent of each directory created.
///
/// Returns the directories that were created, deepest first.
fn create_dir_durable(path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut missing = Vec::new();
    let mut current = path;
    while !current.as_os_str().is_empty() && !current.exists() {
        missing.push(current.to_path_buf());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    fs::create_dir_all(path)?;
    for dir in &missing {
        match dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => sync_dir(parent)?,
            _ => sync_dir(Path::new("."))?,
        }
    }
    Ok(missing)
}

#[derive(Clone)]
pub struct Blob {
    partition: String,
    name: String,
    file: Arc<File>,
}

impl Blob {
    fn new(partition: &str, name: &str, file: File) -> Self {
        Self {
            partition: partition.into(),
            name: name.into(),
            file: Arc::new(file),
        }
    }
}

impl crate::Storage for Storage {
    type Blob = Blob;

    fn create(&self, partition: &str, name: &str) -> Result<Blob, Error> {
        let path = self.blob_path(partition, name)?;
        let parent = match path.parent() {
            Some(parent) => parent,
            None => return Err(Error::PartitionCreationFailed(partition.into())),
        };

        // Create the partition directory, if it does not exist
        let created = create_dir_durable(parent)
            .map_err(|_| Error::PartitionCreationFailed(partition.into()))?;
        if !created.is_empty() {
            debug!(partition, directories = created.len(), "created partition");
        }

        // Refuse to clobber an existing blob
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::BlobExists(partition.into(), name.into()),
                _ => Error::BlobOpenFailed(partition.into(), name.into(), e),
            })?;
        sync_dir(parent).map_err(|e| Error::BlobSyncFailed(partition.into(), name.into(), e))?;
        debug!(partition, name, "created blob");

        Ok(Blob::new(partition, name, file))
    }

    fn open(&self, partition: &str, name: &str) -> Result<(Blob, u64), Error> {
        let path = self.blob_path(partition, name)?;
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::BlobMissing(partition.into(), name.into()),
                _ => Error::BlobOpenFailed(partition.into(), name.into(), e),
            })?;
        let len = file
            .metadata()
            .map_err(|e| Error::BlobOpenFailed(partition.into(), name.into(), e))?
            .len();

        Ok((Blob::new(partition, name, file), len))
    }

    fn exists(&self, partition: &str, name: &str) -> Result<bool, Error> {
        let path = self.blob_path(partition, name)?;
        match fs::metadata(path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn remove(&self, partition: &str, name: Option<&str>) -> Result<(), Error> {
        if let Some(name) = name {
            let path = self.blob_path(partition, name)?;
            fs::remove_file(path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::BlobMissing(partition.into(), name.into()),
                _ => Error::BlobRemoveFailed(partition.into(), name.into(), e),
            })?;
        } else {
            let path = self.partition_path(partition)?;
            fs::remove_dir_all(path).map_err(|_| Error::PartitionMissing(partition.into()))?;
        }
        Ok(())
    }

    fn scan(&self, partition: &str) -> Result<Vec<String>, Error> {
        let path = self.partition_path(partition)?;
        let entries = fs::read_dir(path).map_err(|_| Error::PartitionMissing(partition.into()))?;
        let mut blobs = Vec::new();
        for entry in entries {
            let entry = entry?;
            // Nested partitions are not blobs of this partition
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| Error::PartitionCorrupt(partition.into()))?;
            blobs.push(name);
        }
        blobs.sort();
        Ok(blobs)
    }
}

impl crate::Blob for Blob {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let map_err = |e: std::io::Error| match e.kind() {
            ErrorKind::UnexpectedEof => Error::BlobInsufficientLength,
            _ => Error::BlobReadFailed(self.partition.clone(), self.name.clone(), offset, e),
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset).map_err(map_err)?;
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut read = 0;
            while read < buf.len() {
                let n = self
                    .file
                    .seek_read(&mut buf[read..], offset + read as u64)
                    .map_err(map_err)?;
                if n == 0 {
                    return Err(Error::BlobInsufficientLength);
                }
                read += n;
            }
        }
        Ok(())
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let map_err =
            |e| Error::BlobWriteFailed(self.partition.clone(), self.name.clone(), offset, e);
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.write_all_at(buf, offset).map_err(map_err)?;
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut written = 0;
            while written < buf.len() {
                let n = self
                    .file
                    .seek_write(&buf[written..], offset + written as u64)
                    .map_err(map_err)?;
                written += n;
            }
        }
        Ok(())
    }

    fn sync(&self) -> Result<(), Error> {
        self.file
            .sync_all()
            .map_err(|e| Error::BlobSyncFailed(self.partition.clone(), self.name.clone(), e))
    }
}
