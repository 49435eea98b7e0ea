//! Validated search requests.

use crate::error::{ErrorKind, Result};
use regex::Regex;
use sharefind_storage::AccountRef;
use sharefind_storage::path::validate_name;
use std::sync::LazyLock;

static SHARE_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());
static STORAGE_ACCOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]{3,24}$").unwrap());

/// Which scopes of a share to search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Breadth {
    /// Only the live share.
    #[cfg_attr(feature = "cli", value(name = "FileShare"))]
    LiveOnly,
    /// Only the share's snapshots, newest first.
    #[cfg_attr(feature = "cli", value(name = "FileShareSnapshots"))]
    SnapshotsOnly,
    /// The live share, then its snapshots newest first.
    #[default]
    #[cfg_attr(feature = "cli", value(name = "Both"))]
    Both,
}
impl Breadth {
    pub fn includes_live(&self) -> bool {
        matches!(self, Self::LiveOnly | Self::Both)
    }

    pub fn includes_snapshots(&self) -> bool {
        matches!(self, Self::SnapshotsOnly | Self::Both)
    }
}

/// What to do after finding a match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum MatchBehavior {
    /// Stop immediately: the first match is the only one reported.
    #[cfg_attr(feature = "cli", value(name = "End"))]
    End,
    /// Finish searching the current scope, then stop.
    #[default]
    #[cfg_attr(feature = "cli", value(name = "ScopeEnd"))]
    ScopeEnd,
    /// Search everything.
    #[cfg_attr(feature = "cli", value(name = "Continue"))]
    Continue,
}

/// A search that has passed validation.
///
/// Construction is the only place requests are checked, so everything past
/// this point can assume well-formed names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    account: AccountRef,
    share_name: String,
    target: String,
    breadth: Breadth,
    behavior: MatchBehavior,
}
impl SearchRequest {
    pub fn new(
        account: AccountRef,
        share_name: impl Into<String>,
        target: impl Into<String>,
        breadth: Breadth,
        behavior: MatchBehavior,
    ) -> Result<Self> {
        let share_name = share_name.into();
        let target = target.into();
        if validate_name(&target).is_err() {
            exn::bail!(ErrorKind::InvalidRequest(format!("target item `{target}` is not a single entry name")));
        }
        if !(3..=63).contains(&share_name.len()) || !SHARE_NAME.is_match(&share_name) {
            exn::bail!(ErrorKind::InvalidRequest(format!("`{share_name}` is not a valid file share name")));
        }
        if !STORAGE_ACCOUNT.is_match(&account.storage_account) {
            exn::bail!(ErrorKind::InvalidRequest(format!(
                "`{}` is not a valid storage account name",
                account.storage_account
            )));
        }
        if account.resource_group.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidRequest("resource group is empty".to_string()));
        }
        Ok(Self { account, share_name, target, breadth, behavior })
    }

    pub fn account(&self) -> &AccountRef {
        &self.account
    }

    pub fn share_name(&self) -> &str {
        &self.share_name
    }

    /// Exact name of the file or directory being searched for.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn breadth(&self) -> Breadth {
        self.breadth
    }

    pub fn behavior(&self) -> MatchBehavior {
        self.behavior
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    fn account(storage_account: &str, resource_group: &str) -> AccountRef {
        AccountRef {
            subscription: Uuid::nil(),
            resource_group: resource_group.to_string(),
            storage_account: storage_account.to_string(),
        }
    }

    fn request(share: &str, target: &str) -> Result<SearchRequest> {
        SearchRequest::new(account("account", "rg"), share, target, Breadth::Both, MatchBehavior::ScopeEnd)
    }

    #[rstest]
    #[case("data")]
    #[case("abc")]
    #[case("team-data-2024")]
    fn test_valid_share_name(#[case] share: &str) {
        assert!(request(share, "target.txt").is_ok());
    }

    #[rstest]
    #[case::too_short("ab")]
    #[case::uppercase("Data")]
    #[case::leading_hyphen("-data")]
    #[case::trailing_hyphen("data-")]
    #[case::double_hyphen("da--ta")]
    #[case::underscore("da_ta")]
    fn test_invalid_share_name(#[case] share: &str) {
        let err = request(share, "target.txt").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRequest(_)));
    }

    #[rstest]
    #[case(63, true)]
    #[case(64, false)]
    fn test_share_name_length(#[case] length: usize, #[case] valid: bool) {
        assert_eq!(request(&"a".repeat(length), "target.txt").is_ok(), valid);
    }

    #[rstest]
    #[case::empty("")]
    #[case::current(".")]
    #[case::parent("..")]
    #[case::nested("a/b")]
    #[case::null("a\0b")]
    fn test_invalid_target(#[case] target: &str) {
        let err = request("data", target).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRequest(_)));
    }

    #[rstest]
    #[case("account", "rg", true)]
    #[case("ab", "rg", false)]
    #[case("Account", "rg", false)]
    #[case("account-1", "rg", false)]
    #[case("abcdefghijklmnopqrstuvwx", "rg", true)]
    #[case("abcdefghijklmnopqrstuvwxy", "rg", false)]
    #[case("account", "  ", false)]
    fn test_account(#[case] storage_account: &str, #[case] resource_group: &str, #[case] valid: bool) {
        let result = SearchRequest::new(
            account(storage_account, resource_group),
            "data",
            "target.txt",
            Breadth::Both,
            MatchBehavior::ScopeEnd,
        );
        assert_eq!(result.is_ok(), valid);
    }

    #[test]
    fn test_breadth() {
        assert!(Breadth::Both.includes_live() && Breadth::Both.includes_snapshots());
        assert!(!Breadth::LiveOnly.includes_snapshots());
        assert!(!Breadth::SnapshotsOnly.includes_live());
    }
}
