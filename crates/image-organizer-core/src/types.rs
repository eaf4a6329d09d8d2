use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Supported image formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Heic,
    Tiff,
    Other(String),
}

impl ImageFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "webp" => Self::Webp,
            "heic" | "heif" => Self::Heic,
            "tif" | "tiff" => Self::Tiff,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Where a file lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Local,
    Remote,
}

/// One file's identity for duplicate matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub platform: Platform,

    /// Filesystem path (local) or object id (remote)
    pub location: String,

    pub display_name: String,

    pub size_bytes: u64,

    /// Hex-encoded content digest; empty means unknown
    pub content_checksum: String,

    pub modified_at: Option<DateTime<Utc>>,

    /// Browser link for remote files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

impl FileRecord {
    pub fn local(
        location: impl Into<String>,
        display_name: impl Into<String>,
        size_bytes: u64,
        content_checksum: impl Into<String>,
    ) -> Self {
        Self {
            platform: Platform::Local,
            location: location.into(),
            display_name: display_name.into(),
            size_bytes,
            content_checksum: content_checksum.into(),
            modified_at: None,
            web_url: None,
        }
    }

    pub fn remote(
        location: impl Into<String>,
        display_name: impl Into<String>,
        size_bytes: u64,
        content_checksum: impl Into<String>,
    ) -> Self {
        Self {
            platform: Platform::Remote,
            ..Self::local(location, display_name, size_bytes, content_checksum)
        }
    }

    pub fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    /// Checksum usable for exact matching, if any
    pub fn checksum_key(&self) -> Option<&str> {
        let checksum = self.content_checksum.trim();
        (!checksum.is_empty()).then_some(checksum)
    }
}

/// A file as reported by a cloud drive listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    pub name: String,

    /// Drive listings report sizes as decimal strings
    #[serde(default, deserialize_with = "size_from_number_or_string")]
    pub size: u64,

    #[serde(default, alias = "md5Checksum")]
    pub checksum: Option<String>,

    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub web_view_link: Option<String>,
}

impl From<RemoteFile> for FileRecord {
    fn from(file: RemoteFile) -> Self {
        Self {
            platform: Platform::Remote,
            location: file.id,
            display_name: file.name,
            size_bytes: file.size,
            content_checksum: file.checksum.unwrap_or_default(),
            modified_at: file.modified_time,
            web_url: file.web_view_link,
        }
    }
}

fn size_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Bytes held on each platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceByPlatform {
    pub local: u64,
    pub remote: u64,
}

/// Files sharing a checksum (or a similarity relationship).
///
/// Members keep insertion order; a group always has at least two members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Checksum shared by every member
    pub key: String,
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Build a group, or `None` for fewer than two members
    pub fn new(key: impl Into<String>, members: Vec<FileRecord>) -> Option<Self> {
        (members.len() >= 2).then(|| Self {
            key: key.into(),
            members,
        })
    }

    pub fn total_files(&self) -> usize {
        self.members.len()
    }

    pub fn total_size(&self) -> u64 {
        self.members.iter().map(|m| m.size_bytes).sum()
    }

    pub fn space_by_platform(&self) -> SpaceByPlatform {
        self.members
            .iter()
            .fold(SpaceByPlatform::default(), |mut space, member| {
                match member.platform {
                    Platform::Local => space.local += member.size_bytes,
                    Platform::Remote => space.remote += member.size_bytes,
                }
                space
            })
    }

    /// Name of the first member, used when listing groups
    pub fn display_name(&self) -> &str {
        self.members
            .first()
            .map(|m| m.display_name.as_str())
            .unwrap_or_default()
    }

    pub fn on_platform(&self, platform: Platform) -> impl Iterator<Item = &FileRecord> {
        self.members.iter().filter(move |m| m.platform == platform)
    }
}

// -- Tests --
