//! A [crate::Storage] backed by process memory.
//!
//! Blobs live as long as the [Storage] (or any clone of it) does. Writes are immediately
//! visible to every handle of the same blob, so `sync` is a no-op.

use crate::Error;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock},
};

type Content = Arc<RwLock<Vec<u8>>>;
type Partition = BTreeMap<String, Content>;

/// In-memory storage.
#[derive(Clone, Default)]
pub struct Storage {
    partitions: Arc<Mutex<BTreeMap<String, Partition>>>,
}

impl crate::Storage for Storage {
    type Blob = Blob;

    fn create(&self, partition: &str, name: &str) -> Result<Blob, Error> {
        super::validate_partition_name(partition)?;
        super::validate_blob_name(name)?;

        let mut partitions = self.partitions.lock().unwrap();
        let entry = partitions.entry(partition.into()).or_default();
        if entry.contains_key(name) {
            return Err(Error::BlobExists(partition.into(), name.into()));
        }
        let content = Content::default();
        entry.insert(name.into(), content.clone());
        Ok(Blob::new(partition, name, content))
    }

    fn open(&self, partition: &str, name: &str) -> Result<(Blob, u64), Error> {
        super::validate_partition_name(partition)?;
        super::validate_blob_name(name)?;

        let partitions = self.partitions.lock().unwrap();
        let content = partitions
            .get(partition)
            .and_then(|blobs| blobs.get(name))
            .ok_or_else(|| Error::BlobMissing(partition.into(), name.into()))?
            .clone();
        let len = content.read().unwrap().len() as u64;
        Ok((Blob::new(partition, name, content), len))
    }

    fn exists(&self, partition: &str, name: &str) -> Result<bool, Error> {
        super::validate_partition_name(partition)?;
        super::validate_blob_name(name)?;

        let partitions = self.partitions.lock().unwrap();
        Ok(partitions
            .get(partition)
            .is_some_and(|blobs| blobs.contains_key(name)))
    }

    fn remove(&self, partition: &str, name: Option<&str>) -> Result<(), Error> {
        super::validate_partition_name(partition)?;

        let mut partitions = self.partitions.lock().unwrap();
        match name {
            Some(name) => {
                super::validate_blob_name(name)?;
                partitions
                    .get_mut(partition)
                    .and_then(|blobs| blobs.remove(name))
                    .ok_or_else(|| Error::BlobMissing(partition.into(), name.into()))?;
            }
            None => {
                let nested = format!("{partition}/");
                let before = partitions.len();
                partitions.retain(|key, _| key != partition && !key.starts_with(&nested));
                if partitions.len() == before {
                    return Err(Error::PartitionMissing(partition.into()));
                }
            }
        }
        Ok(())
    }

    fn scan(&self, partition: &str) -> Result<Vec<String>, Error> {
        super::validate_partition_name(partition)?;

        let partitions = self.partitions.lock().unwrap();
        let blobs = partitions
            .get(partition)
            .ok_or_else(|| Error::PartitionMissing(partition.into()))?;
        Ok(blobs.keys().cloned().collect())
    }
}

#[derive(Clone)]
pub struct Blob {
    partition: String,
    name: String,
    content: Content,
}

impl Blob {
    fn new(partition: &str, name: &str, content: Content) -> Self {
        Self {
            partition: partition.into(),
            name: name.into(),
            content,
        }
    }

    /// Returns the `partition/name` of the blob.
    pub fn path(&self) -> String {
        format!("{}/{}", self.partition, self.name)
    }
}

impl crate::Blob for Blob {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let offset: usize = offset.try_into().map_err(|_| Error::OffsetOverflow)?;
        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::OffsetOverflow)?;
        let content = self.content.read().unwrap();
        if end > content.len() {
            return Err(Error::BlobInsufficientLength);
        }
        buf.copy_from_slice(&content[offset..end]);
        Ok(())
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let offset: usize = offset.try_into().map_err(|_| Error::OffsetOverflow)?;
        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::OffsetOverflow)?;
        let mut content = self.content.write().unwrap();
        if end > content.len() {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::tests::run_storage_tests, Blob as _, Storage as _};
    use commonware_macros::test_traced;

    #[test_traced]
    fn test_memory_storage() {
        run_storage_tests(Storage::default());
    }

    #[test_traced]
    fn test_clones_share_content() {
        let storage = Storage::default();
        let blob = storage.create("partition", "blob").unwrap();
        blob.write_at(b"abc", 0).unwrap();

        let (reopened, len) = storage.clone().open("partition", "blob").unwrap();
        assert_eq!(len, 3);
        assert_eq!(reopened.path(), "partition/blob");

        // Writes through one handle are visible through the other
        reopened.write_at(b"Z", 1).unwrap();
        let mut buf = [0u8; 3];
        blob.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"aZc");
    }
}
