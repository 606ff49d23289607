//! Object naming
//!
//! Each partition owns two objects under the configured folder:
//!
//! - `{folder}/{partition}.image`: the encoded record stream
//! - `{folder}/{partition}.sig`: the JSON signature
//!
//! An empty folder puts both at the namespace root.

use cellsnap_core::PartitionId;

/// Image object suffix
pub const IMAGE_EXTENSION: &str = "image";

/// Signature object suffix
pub const SIGNATURE_EXTENSION: &str = "sig";

/// Builds object names for partition images and signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayout {
    folder: String,
}

impl ImageLayout {
    /// Create a layout rooted at `folder`.
    ///
    /// Leading and trailing slashes are dropped so names never contain
    /// empty path segments.
    pub fn new(folder: impl Into<String>) -> Self {
        let folder = folder.into();
        ImageLayout {
            folder: folder.trim_matches('/').to_string(),
        }
    }

    /// The normalized folder
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Object name of a partition image
    pub fn image_name(&self, partition: PartitionId) -> String {
        self.object_name(partition, IMAGE_EXTENSION)
    }

    /// Object name of a partition signature
    pub fn signature_name(&self, partition: PartitionId) -> String {
        self.object_name(partition, SIGNATURE_EXTENSION)
    }

    /// Parse the partition number out of an image object name.
    ///
    /// Only names this layout produces are accepted, so `03.image` or
    /// `+3.image` are not partition 3.
    pub fn parse_image_name(&self, name: &str) -> Option<PartitionId> {
        let file = if self.folder.is_empty() {
            name
        } else {
            name.strip_prefix(&self.folder)?.strip_prefix('/')?
        };
        let number = file.strip_suffix(IMAGE_EXTENSION)?.strip_suffix('.')?;
        let partition = PartitionId(number.parse().ok()?);
        (self.image_name(partition) == name).then_some(partition)
    }

    fn object_name(&self, partition: PartitionId, extension: &str) -> String {
        if self.folder.is_empty() {
            format!("{}.{}", partition, extension)
        } else {
            format!("{}/{}.{}", self.folder, partition, extension)
        }
    }
}
