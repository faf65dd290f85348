//! Implementations of the [crate::Storage] trait.

pub mod fs;
pub mod memory;

/// Validate that a partition name is one or more `/`-separated segments of allowed characters.
///
/// Segments must be non-empty and only contain alphanumeric characters, dashes ('-'),
/// or underscores ('_').
pub fn validate_partition_name(partition: &str) -> Result<(), crate::Error> {
    let valid = !partition.is_empty()
        && partition.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || ['_', '-'].contains(&c))
        });
    if !valid {
        return Err(crate::Error::PartitionNameInvalid(partition.into()));
    }
    Ok(())
}

/// Validate that a blob name contains only allowed characters.
///
/// Blob names must be non-empty, may not start with a dot, and only contain alphanumeric
/// characters, dashes ('-'), underscores ('_'), or dots ('.').
pub fn validate_blob_name(name: &str) -> Result<(), crate::Error> {
    if name.is_empty()
        || name.starts_with('.')
        || name
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || ['_', '-', '.'].contains(&c)))
    {
        return Err(crate::Error::BlobNameInvalid(name.into()));
    }
    Ok(())
}
