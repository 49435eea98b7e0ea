use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use sharefind_storage::{ResourceType, ShareScope, format_timestamp, parse_timestamp};
use uuid::Uuid;

/// A `file_shares` row. Timestamps are stored as RFC 3339 text.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ScopeRow {
    pub(crate) file_share_id: String,
    pub(crate) data_plane_endpoint: String,
    pub(crate) resource_name: String,
    pub(crate) resource_type: String,
    pub(crate) resource_create_time: String,
    pub(crate) share_name: String,
    pub(crate) is_snapshot: i64,
    pub(crate) snapshot_time: Option<String>,
}
impl TryFrom<&ShareScope> for ScopeRow {
    type Error = Error;
    fn try_from(scope: &ShareScope) -> Result<Self, Self::Error> {
        Ok(Self {
            file_share_id: scope.file_share_id.to_string(),
            data_plane_endpoint: scope.data_plane_endpoint.clone(),
            resource_name: scope.resource_name.clone(),
            resource_type: scope.resource_type.to_string(),
            resource_create_time: format_timestamp(&scope.resource_create_time)
                .or_raise(|| ErrorKind::InvalidData("resource creation time"))?,
            share_name: scope.share_name.clone(),
            is_snapshot: i64::from(scope.is_snapshot()),
            snapshot_time: scope
                .snapshot_time
                .as_ref()
                .map(format_timestamp)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("snapshot time"))?,
        })
    }
}
impl TryFrom<ScopeRow> for ShareScope {
    type Error = Error;
    fn try_from(row: ScopeRow) -> Result<Self, Self::Error> {
        let snapshot_time = row
            .snapshot_time
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .or_raise(|| ErrorKind::InvalidData("snapshot time"))?;
        // The flag is redundant with the timestamp; a row where they disagree
        // was not written by us.
        if (row.is_snapshot != 0) != snapshot_time.is_some() {
            exn::bail!(ErrorKind::InvalidData("snapshot flag"));
        }
        Ok(Self {
            file_share_id: Uuid::parse_str(&row.file_share_id).or_raise(|| ErrorKind::InvalidData("file share id"))?,
            data_plane_endpoint: row.data_plane_endpoint,
            resource_name: row.resource_name,
            resource_type: row
                .resource_type
                .parse::<ResourceType>()
                .or_raise(|| ErrorKind::InvalidData("resource type"))?,
            resource_create_time: parse_timestamp(&row.resource_create_time)
                .or_raise(|| ErrorKind::InvalidData("resource creation time"))?,
            share_name: row.share_name,
            snapshot_time,
        })
    }
}
