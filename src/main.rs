mod cli;
mod logging;
mod report;

use crate::cli::{Cli, ClearCacheArgs, Command, OutputFormat, SearchArgs};
use crate::report::Failure;
use clap::Parser;
use futures::StreamExt;
use sharefind_cache::{Database, Repository};
use sharefind_config::{BackendConfig, Config};
use sharefind_search::{CacheLocation, MatchRecord, SearchEvent, SearchOptions, SearchRequest, TraversalOptions};
use sharefind_storage::backend::LocalBackend;
use sharefind_storage::{AccountRef, BackendHandle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => failure.report(),
    }
}

async fn run(cli: Cli) -> Result<(), Failure> {
    match cli.command {
        Command::Search(args) => {
            // Validate before touching the configuration, the backend or the cache.
            let request = request(&args)?;
            let config = Config::load(cli.config.as_deref())?;
            search(&config, &request, args).await
        },
        Command::ClearCache(args) => {
            let config = Config::load(cli.config.as_deref())?;
            clear_cache(&config, args).await
        },
    }
}

fn request(args: &SearchArgs) -> Result<SearchRequest, Failure> {
    let account = AccountRef {
        subscription: args.subscription,
        resource_group: args.resource_group.clone(),
        storage_account: args.storage_account.clone(),
    };
    let request = SearchRequest::new(
        account,
        args.file_share.clone(),
        args.target_item.clone(),
        args.search_scope,
        args.match_behavior,
    )?;
    Ok(request)
}

/// An explicit `--cache-path` wins over the configured location.
fn cache_path(config: &Config, explicit: Option<PathBuf>) -> Result<PathBuf, Failure> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(config.cache_path()?),
    }
}

fn backend(config: &Config) -> Result<BackendHandle, Failure> {
    let handle: BackendHandle = match config.backend()? {
        BackendConfig::Local { root } => Arc::new(LocalBackend::new("local", root)?),
    };
    tracing::debug!(backend = handle.name(), "Configured backend");
    Ok(handle)
}

fn print(format: OutputFormat, record: &MatchRecord) {
    match format {
        OutputFormat::Text => println!("{record}"),
        OutputFormat::Json => match serde_json::to_string(record) {
            Ok(json) => println!("{json}"),
            Err(err) => tracing::error!(error = %err, "Unable to serialize match"),
        },
    }
}

async fn search(config: &Config, request: &SearchRequest, args: SearchArgs) -> Result<(), Failure> {
    let backend = backend(config)?;
    let options = SearchOptions {
        cache: CacheLocation::File(cache_path(config, args.cache_path)?),
        traversal: TraversalOptions {
            reuse_snapshot_listings: config.cache.reuse_snapshot_listings,
            tolerate_write_errors: config.cache.tolerate_write_errors,
        },
    };

    let stream = sharefind_search::search(&backend, &options, request);
    let mut stream = std::pin::pin!(stream);
    while let Some(event) = stream.next().await {
        match event? {
            SearchEvent::Started => tracing::debug!(share = request.share_name(), "Search started"),
            SearchEvent::ScopesResolved(count) => tracing::debug!(count, "Scopes resolved"),
            SearchEvent::ScopeStarted(scope) => tracing::info!(scope = %scope, "Searching scope"),
            SearchEvent::Matched(record) => print(args.output, &record),
            SearchEvent::ScopeFinished { matches } => tracing::debug!(matches, "Scope finished"),
            SearchEvent::Complete { matches } => tracing::info!(matches, "Search complete"),
        }
    }
    Ok(())
}

async fn clear_cache(config: &Config, args: ClearCacheArgs) -> Result<(), Failure> {
    let path = cache_path(config, args.cache_path)?;
    let db = Database::connect(&path).await.map_err(|err| Failure::cache_init(&err))?;
    let result = Repository::from(&db).clear().await.map_err(|err| Failure::cache_write(&err));
    db.close().await;
    result?;
    tracing::info!(path = %path.display(), "Cache cleared");
    Ok(())
}
