//! Failure reporting: one JSON diagnostic on stderr and an exit code.

use exn::Frame;
use miette::{Diagnostic, JSONReportHandler};
use sharefind_search::error::ErrorKind as SearchErrorKind;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::process::ExitCode;

/// Exit code for requests that can never succeed as given.
const USAGE: u8 = 2;
const FAILURE: u8 = 1;

/// One link of a flattened error tree.
#[derive(Debug)]
struct Cause {
    message: String,
    source: Option<Box<Cause>>,
}

impl Display for Cause {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.message)
    }
}

impl Error for Cause {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Messages of every frame below `frame`, depth first.
fn messages(frame: &Frame, into: &mut Vec<String>) {
    for child in frame.children() {
        into.push(child.error().to_string());
        messages(child, into);
    }
}

fn chain(frame: &Frame) -> Option<Box<Cause>> {
    let mut found = Vec::new();
    messages(frame, &mut found);
    found.into_iter().rev().fold(None, |source, message| Some(Box::new(Cause { message, source })))
}

/// The first fatal error of a run, reduced to what the caller needs.
#[derive(Debug)]
pub struct Failure {
    code: &'static str,
    message: String,
    cause: Option<Box<Cause>>,
    exit_code: u8,
}

impl Failure {
    fn new(code: &'static str, frame: &Frame, exit_code: u8) -> Self {
        // The full tree (with locations) is only interesting when debugging.
        tracing::debug!(error = ?frame, code, "{frame}");
        Self { code, message: frame.to_string(), cause: chain(frame), exit_code }
    }

    pub fn cache_init(err: &sharefind_cache::error::Error) -> Self {
        Self::new("sharefind::cache_init", err.frame(), FAILURE)
    }

    pub fn cache_write(err: &sharefind_cache::error::Error) -> Self {
        Self::new("sharefind::cache_write", err.frame(), FAILURE)
    }

    pub fn render(&self) -> String {
        let mut json = String::new();
        match JSONReportHandler::new().render_report(&mut json, self) {
            Ok(()) => json,
            Err(_) => self.message.clone(),
        }
    }

    /// Print the diagnostic and return the matching exit code.
    pub fn report(&self) -> ExitCode {
        eprintln!("{}", self.render());
        ExitCode::from(self.exit_code)
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.message)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

impl Diagnostic for Failure {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.code))
    }
}

impl From<sharefind_search::error::Error> for Failure {
    fn from(err: sharefind_search::error::Error) -> Self {
        let (code, exit_code) = match &*err {
            SearchErrorKind::InvalidRequest(_) => ("sharefind::invalid_request", USAGE),
            SearchErrorKind::ScopeNotFound(_) => ("sharefind::scope_not_found", FAILURE),
            SearchErrorKind::NoSnapshots(_) => ("sharefind::no_snapshots", FAILURE),
            SearchErrorKind::ScopeListing => ("sharefind::scope_listing", FAILURE),
            SearchErrorKind::CacheInit => ("sharefind::cache_init", FAILURE),
            SearchErrorKind::RemoteListing(_) => ("sharefind::remote_listing", FAILURE),
            SearchErrorKind::CacheWrite(_) => ("sharefind::cache_write", FAILURE),
        };
        Self::new(code, err.frame(), exit_code)
    }
}

impl From<sharefind_config::error::Error> for Failure {
    fn from(err: sharefind_config::error::Error) -> Self {
        Self::new("sharefind::config", err.frame(), USAGE)
    }
}

impl From<sharefind_storage::error::Error> for Failure {
    fn from(err: sharefind_storage::error::Error) -> Self {
        Self::new("sharefind::backend", err.frame(), FAILURE)
    }
}
