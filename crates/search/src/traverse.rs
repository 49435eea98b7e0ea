//! Breadth-first traversal of a single scope.
//!
//! A [`ScopeWalk`] owns nothing but a queue of directory paths still to be
//! listed and the children of the directory currently being examined.
//! Every call to [`ScopeWalk::next`] either examines an already-listed child
//! or lists exactly one more directory, so the walk can be suspended after
//! any match without holding on to more than one listing.

use crate::error::{ErrorKind, Result};
use crate::request::MatchBehavior;
use exn::ResultExt;
use serde::Serialize;
use sharefind_cache::Repository;
use sharefind_storage::{ChildEntry, ShareBackend, ShareScope, path};
use std::collections::VecDeque;
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Whether the search should keep going, after some number of matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flow {
    /// Keep examining the current scope.
    pub continue_scope: bool,
    /// Move on to the next scope once the current one is done.
    pub continue_run: bool,
}
impl Default for Flow {
    fn default() -> Self {
        Self { continue_scope: true, continue_run: true }
    }
}
impl Flow {
    /// The flow after one more match.
    pub fn on_match(self, behavior: MatchBehavior) -> Self {
        match behavior {
            MatchBehavior::End => Self { continue_scope: false, continue_run: false },
            MatchBehavior::ScopeEnd => Self { continue_run: false, ..self },
            MatchBehavior::Continue => self,
        }
    }
}

/// One occurrence of the target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub share_name: String,
    /// `None` for the live share.
    #[serde(with = "time::serde::rfc3339::option")]
    pub snapshot_time: Option<OffsetDateTime>,
    /// Absolute path of the match inside its scope, without a trailing separator.
    pub full_path: String,
    pub is_directory: bool,
}
impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.snapshot_time {
            None => write!(f, "{}:{}", self.share_name, self.full_path),
            Some(time) => write!(
                f,
                "{}@{}:{}",
                self.share_name,
                time.format(&Rfc3339).map_err(|_| fmt::Error)?,
                self.full_path
            ),
        }
    }
}

/// How listings are obtained and recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Serve snapshot listings from the cache when recorded by an earlier run.
    pub reuse_snapshot_listings: bool,
    /// Log failed cache writes instead of failing the walk.
    pub tolerate_write_errors: bool,
}

/// Everything shared between the walks of one search.
pub struct Traversal<'a> {
    backend: &'a dyn ShareBackend,
    cache: &'a Repository,
    options: TraversalOptions,
    target: &'a str,
    behavior: MatchBehavior,
}
impl<'a> Traversal<'a> {
    pub fn new(
        backend: &'a dyn ShareBackend,
        cache: &'a Repository,
        options: TraversalOptions,
        target: &'a str,
        behavior: MatchBehavior,
    ) -> Self {
        Self { backend, cache, options, target, behavior }
    }

    /// Start walking `scope` from its root.
    pub fn walk<'w>(&'w self, scope: &'w ShareScope) -> ScopeWalk<'w> {
        ScopeWalk {
            traversal: self,
            scope,
            flow: Flow::default(),
            queue: VecDeque::from([path::ROOT.to_string()]),
            current: String::new(),
            pending: VecDeque::new(),
        }
    }
}

/// Pull-based breadth-first walk over one scope.
pub struct ScopeWalk<'w> {
    traversal: &'w Traversal<'w>,
    scope: &'w ShareScope,
    flow: Flow,
    /// Directory paths (trailing separator) waiting to be listed.
    queue: VecDeque<String>,
    /// Directory whose children are in `pending`.
    current: String,
    pending: VecDeque<ChildEntry>,
}
impl ScopeWalk<'_> {
    /// The next match in breadth-first order, or `None` when the scope is
    /// exhausted or the match behavior says to stop.
    pub async fn next(&mut self) -> Result<Option<MatchRecord>> {
        loop {
            if !self.flow.continue_scope {
                return Ok(None);
            }
            if let Some(child) = self.pending.pop_front() {
                let full_path = path::child(&self.current, &child.name);
                if child.is_directory {
                    // Matching directories are searched too.
                    self.queue.push_back(path::as_directory(&full_path));
                }
                if child.name == self.traversal.target {
                    self.flow = self.flow.on_match(self.traversal.behavior);
                    return Ok(Some(MatchRecord {
                        share_name: self.scope.share_name.clone(),
                        snapshot_time: self.scope.snapshot_time,
                        full_path,
                        is_directory: child.is_directory,
                    }));
                }
                continue;
            }
            let Some(directory) = self.queue.pop_front() else {
                return Ok(None);
            };
            self.pending = self.list(&directory).await?.into();
            self.current = directory;
        }
    }

    /// Flow state after the matches returned so far.
    pub fn flow(&self) -> Flow {
        self.flow
    }

    async fn list(&self, directory: &str) -> Result<Vec<ChildEntry>> {
        let Traversal { backend, cache, options, .. } = self.traversal;
        // The live share can change between runs; snapshots can't.
        if self.scope.is_snapshot() && options.reuse_snapshot_listings {
            match cache.cached_listing(self.scope, directory).await {
                Ok(Some(children)) => {
                    tracing::trace!(scope = %self.scope, directory, "Using cached listing");
                    return Ok(children);
                },
                Ok(None) => {},
                Err(err) => tracing::warn!(scope = %self.scope, directory, error = ?err, "Unable to read cached listing"),
            }
        }

        tracing::trace!(scope = %self.scope, directory, "Listing directory");
        let children = backend
            .list_directory(self.scope, directory)
            .await
            .or_raise(|| ErrorKind::RemoteListing(format!("{}:{directory}", self.scope)))?;

        let recorded = cache
            .record_listing(self.scope, directory, &children)
            .await
            .or_raise(|| ErrorKind::CacheWrite(format!("{}:{directory}", self.scope)));
        match recorded {
            Ok(()) => {},
            Err(err) if options.tolerate_write_errors => {
                tracing::warn!(scope = %self.scope, directory, error = ?err, "Unable to record listing in cache");
            },
            Err(err) => return Err(err),
        }
        Ok(children)
    }
}
