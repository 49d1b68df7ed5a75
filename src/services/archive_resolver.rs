//! Maps client-supplied archive identifiers onto reporter lookup URLs.
//!
//! Three forms are accepted, checked in this order:
//! 1. anything starting with `http` is used as-is (lookups against any reporter),
//! 2. legacy paths containing `/archive/` keep what follows the first occurrence,
//! 3. everything else is a bare key on the configured reporter.
//!
//! Form 1 lets a caller point the frontend at an arbitrary URL, which makes
//! it a server-side request forgery surface. It is kept for compatibility;
//! deployments that need to close it install a [`HostAllowList`].

use reqwest::Url;
use std::sync::Arc;
use thiserror::Error;

const LEGACY_MARKER: &str = "/archive/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("archive url `{0}` is not permitted")]
    Rejected(String),
}

/// Which rule matched an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveLocator<'a> {
    Absolute(&'a str),
    Legacy(&'a str),
    Key(&'a str),
}

impl<'a> ArchiveLocator<'a> {
    pub fn classify(raw: &'a str) -> Self {
        if raw.starts_with("http") {
            ArchiveLocator::Absolute(raw)
        } else if let Some((_, rest)) = raw.split_once(LEGACY_MARKER) {
            ArchiveLocator::Legacy(rest)
        } else {
            ArchiveLocator::Key(raw)
        }
    }

    fn to_url(self, reporter_base: &str) -> String {
        match self {
            ArchiveLocator::Absolute(url) => url.to_string(),
            ArchiveLocator::Legacy(key) | ArchiveLocator::Key(key) => {
                format!("{}/api/archives/{}", reporter_base, key)
            }
        }
    }
}

/// Resolve `raw` against `reporter_base` with no policy applied.
pub fn resolve(raw: &str, reporter_base: &str) -> String {
    ArchiveLocator::classify(raw).to_url(reporter_base)
}

/// Decides whether an absolute archive URL may be fetched.
///
/// Only consulted for identifiers that start with `http`; the other forms
/// always target the configured reporter.
pub trait ResolutionPolicy: Send + Sync {
    fn permits(&self, url: &str) -> bool;
}

/// Accepts every absolute URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl ResolutionPolicy for AllowAll {
    fn permits(&self, _url: &str) -> bool {
        true
    }
}

/// Accepts absolute URLs whose host is in the list. Unparsable URLs are
/// rejected.
#[derive(Debug, Clone)]
pub struct HostAllowList {
    hosts: Vec<String>,
}

impl HostAllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.into().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }
}

impl ResolutionPolicy for HostAllowList {
    fn permits(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let with_port = parsed.port().map(|port| format!("{}:{}", host, port));
        self.hosts
            .iter()
            .any(|allowed| *allowed == host || Some(allowed) == with_port.as_ref())
    }
}

/// Resolver bound to one reporter and one policy.
#[derive(Clone)]
pub struct ArchiveResolver {
    reporter_base: String,
    policy: Arc<dyn ResolutionPolicy>,
}

impl ArchiveResolver {
    pub fn new(reporter_base: &str, policy: Arc<dyn ResolutionPolicy>) -> Self {
        Self {
            reporter_base: reporter_base.trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// Resolver with the permissive default policy.
    pub fn permissive(reporter_base: &str) -> Self {
        Self::new(reporter_base, Arc::new(AllowAll))
    }

    pub fn resolve(&self, raw: &str) -> Result<String, ResolveError> {
        let locator = ArchiveLocator::classify(raw);
        if let ArchiveLocator::Absolute(url) = locator {
            if !self.policy.permits(url) {
                return Err(ResolveError::Rejected(url.to_string()));
            }
        }
        Ok(locator.to_url(&self.reporter_base))
    }
}
