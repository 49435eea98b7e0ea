use crate::error::{ErrorKind, Result};
use crate::request::SearchRequest;
use crate::resolve::resolve;
use crate::traverse::{Flow, MatchRecord, Traversal, TraversalOptions};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use sharefind_cache::{Database, Repository};
use sharefind_storage::{BackendHandle, ShareScope};
use std::path::PathBuf;

/// Where the cache database lives for the duration of a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLocation {
    File(PathBuf),
    /// Nothing survives the search (useful for testing).
    InMemory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    pub cache: CacheLocation,
    pub traversal: TraversalOptions,
}

/// Progress events emitted by [`search`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`ScopesResolved`](Self::ScopesResolved): exactly once, with the number
///    of scopes that will be searched at most.
/// 3. For each scope searched, [`ScopeStarted`](Self::ScopeStarted), zero or
///    more [`Matched`](Self::Matched), then [`ScopeFinished`](Self::ScopeFinished).
/// 4. [`Complete`](Self::Complete): exactly once, signalling the stream is
///    finished.
///
/// An error terminates the stream early, in which case [`Complete`](Self::Complete)
/// is never emitted. Matches already emitted remain valid.
#[derive(Debug)]
pub enum SearchEvent {
    Started,
    ScopesResolved(usize),
    ScopeStarted(Box<ShareScope>),
    Matched(MatchRecord),
    ScopeFinished { matches: u64 },
    Complete { matches: u64 },
}

async fn open(location: &CacheLocation) -> Result<Database> {
    let db = match location {
        CacheLocation::File(path) => Database::connect(path).await,
        CacheLocation::InMemory => Database::connect_in_memory().await,
    };
    let db = db.or_raise(|| ErrorKind::CacheInit)?;
    let reconciliation = db.reconciliation();
    if !reconciliation.is_clean() {
        tracing::debug!(
            shares_reset = reconciliation.shares_reset,
            entries_reset = reconciliation.entries_reset,
            "Cache tables were recreated"
        );
    }
    Ok(db)
}

/// Streams [`SearchEvent`]s for every occurrence of the request's target in
/// the requested scopes of its share.
///
/// Scopes are searched one after the other, each breadth-first from its root;
/// matches are emitted in the order they are found. Nothing happens until the
/// stream is polled. The cache database is opened on the first poll and
/// closed before the final event (either [`Complete`](SearchEvent::Complete)
/// or the first error) is emitted.
pub fn search<'a>(
    backend: &'a BackendHandle,
    options: &'a SearchOptions,
    request: &'a SearchRequest,
) -> impl Stream<Item = Result<SearchEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(SearchEvent::Started);
        let db = match open(&options.cache).await {
            Ok(db) => db,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let cache = Repository::from(&db);
        for await event in search_inner(backend, &cache, options, request) {
            let last = matches!(event, Ok(SearchEvent::Complete { .. }) | Err(_));
            if last {
                db.close().await;
            }
            yield event;
            if last {
                return;
            }
        }
    })
}

fn search_inner<'a>(
    backend: &'a BackendHandle,
    cache: &'a Repository,
    options: &'a SearchOptions,
    request: &'a SearchRequest,
) -> impl Stream<Item = Result<SearchEvent>> + 'a {
    stream!({
        let scopes = resolve(
            &**backend,
            cache,
            request.account(),
            request.share_name(),
            request.breadth(),
            options.traversal.tolerate_write_errors,
        )
        .await;
        let scopes = match scopes {
            Ok(scopes) => scopes,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        tracing::info!(share = request.share_name(), scopes = scopes.len(), "Resolved scopes");
        yield Ok(SearchEvent::ScopesResolved(scopes.len()));

        let traversal =
            Traversal::new(&**backend, cache, options.traversal, request.target(), request.behavior());
        let mut flow = Flow::default();
        let mut total = 0;
        for scope in &scopes {
            if !flow.continue_run {
                tracing::debug!(scope = %scope, "Skipping remaining scopes");
                break;
            }
            yield Ok(SearchEvent::ScopeStarted(Box::new(scope.clone())));
            let mut walk = traversal.walk(scope);
            let mut matches = 0;
            loop {
                match walk.next().await {
                    Ok(Some(record)) => {
                        matches += 1;
                        yield Ok(SearchEvent::Matched(record));
                    },
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                }
            }
            flow = walk.flow();
            total += matches;
            tracing::debug!(scope = %scope, matches, "Finished scope");
            yield Ok(SearchEvent::ScopeFinished { matches });
        }
        yield Ok(SearchEvent::Complete { matches: total });
    })
}
