//! Storage models.
//!
//! These types represent both what backends report (scopes and directory
//! listings) and what the cache persists about them.

use crate::error::{Error, ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Coordinates of the storage account that owns a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub subscription: Uuid,
    pub resource_group: String,
    pub storage_account: String,
}

/// Kind of resource a [`ShareScope`] was enumerated as.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum ResourceType {
    #[display("Microsoft.Storage/storageAccounts/fileServices/shares")]
    Share,
    #[display("Microsoft.Storage/storageAccounts/fileServices/shares/snapshots")]
    ShareSnapshot,
}
impl FromStr for ResourceType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Microsoft.Storage/storageAccounts/fileServices/shares" => Ok(Self::Share),
            "Microsoft.Storage/storageAccounts/fileServices/shares/snapshots" => Ok(Self::ShareSnapshot),
            other => exn::bail!(ErrorKind::InvalidValue(format!("resource type `{other}`"))),
        }
    }
}

/// One traversable tree: either the live share or one of its snapshots.
///
/// Whether a scope is a snapshot is derived from [`snapshot_time`](Self::snapshot_time),
/// so a scope can never claim to be a snapshot without a timestamp (or the
/// other way around). Snapshot scopes never change once observed; the live
/// scope can change between any two listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareScope {
    pub file_share_id: Uuid,
    pub data_plane_endpoint: String,
    pub resource_name: String,
    pub resource_type: ResourceType,
    pub resource_create_time: OffsetDateTime,
    pub share_name: String,
    pub snapshot_time: Option<OffsetDateTime>,
}
impl ShareScope {
    pub fn is_snapshot(&self) -> bool {
        self.snapshot_time.is_some()
    }
}
impl fmt::Display for ShareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.snapshot_time {
            None => write!(f, "{}", self.share_name),
            Some(time) => write!(f, "{}@{}", self.share_name, time.format(&Rfc3339).map_err(|_| fmt::Error)?),
        }
    }
}

/// A scope as reported by the management lookup, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredScope {
    pub scope: ShareScope,
    pub deleted: bool,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub is_directory: bool,
}
impl ChildEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_directory: false }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_directory: true }
    }
}

/// Format a timestamp the way every backend and the cache expect it.
pub fn format_timestamp(time: &OffsetDateTime) -> Result<String> {
    time.format(&Rfc3339).or_raise(|| ErrorKind::InvalidValue("timestamp out of range".to_string()))
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).or_raise(|| ErrorKind::InvalidValue(format!("timestamp `{value}`")))
}
