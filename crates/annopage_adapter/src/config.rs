//! Configuration for the annotation adapter.

use annopage_protocol::{DocumentFormat, Endpoints, HistoryTip, IdConvention};
use std::time::Duration;

/// When `all()` goes back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Query only while the cache is unloaded.
    #[default]
    CacheFirst,
    /// Query on every `all()` call.
    AlwaysRevalidate,
}

/// Provenance tag stamped on new annotations and pages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CreatorPolicy {
    /// Leave documents as the caller built them.
    #[default]
    Omit,
    /// Set `creator` on documents that do not carry one.
    Tag(String),
}

impl CreatorPolicy {
    /// Returns the tag, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            CreatorPolicy::Omit => None,
            CreatorPolicy::Tag(tag) => Some(tag),
        }
    }
}

/// Configuration for one annotation adapter.
///
/// A single adapter type covers every store dialect; what differs between
/// stores is captured here.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Store base URL (e.g., "https://tinydev.rerum.io").
    pub base_url: String,
    /// Store paths and verbs.
    pub endpoints: Endpoints,
    /// Document layout (id key, canvas field, page context).
    pub format: DocumentFormat,
    /// History-tip predicate of the page query.
    pub history_tip: HistoryTip,
    /// Provenance tagging.
    pub creator: CreatorPolicy,
    /// Cache revalidation policy.
    pub cache_policy: CachePolicy,
    /// Bound on each remote call.
    pub timeout: Duration,
}

impl AdapterConfig {
    /// The public RERUM sandbox.
    pub const RERUM_SANDBOX_URL: &'static str = "https://tinydev.rerum.io";

    /// Creates a configuration using plain `id`, `historyNextExists` queries
    /// and PATCH `/patch` updates.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoints: Endpoints::standard(),
            format: DocumentFormat::new(),
            history_tip: HistoryTip::NextExistsFlag,
            creator: CreatorPolicy::Omit,
            cache_policy: CachePolicy::CacheFirst,
            timeout: Duration::from_secs(30),
        }
    }

    /// Creates a configuration for a RERUM store: `@id`, the Web Annotation
    /// context on new pages and `__rerum.history.next` tip queries.
    pub fn rerum(base_url: impl Into<String>) -> Self {
        Self {
            endpoints: Endpoints::rerum(),
            format: DocumentFormat::rerum(),
            history_tip: HistoryTip::RerumHistory,
            ..Self::new(base_url)
        }
    }

    /// Sets the endpoint layout.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Sets the document format.
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the identifier convention.
    pub fn with_id_convention(mut self, convention: IdConvention) -> Self {
        self.format.id_convention = convention;
        self
    }

    /// Sets the history-tip predicate.
    pub fn with_history_tip(mut self, tip: HistoryTip) -> Self {
        self.history_tip = tip;
        self
    }

    /// Sets the creator policy.
    pub fn with_creator(mut self, creator: CreatorPolicy) -> Self {
        self.creator = creator;
        self
    }

    /// Sets the cache policy.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins the base URL and a store path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::rerum(Self::RERUM_SANDBOX_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annopage_protocol::HttpMethod;

    #[test]
    fn config_builder() {
        let config = AdapterConfig::new("https://store.example.com/")
            .with_id_convention(IdConvention::JsonLd)
            .with_creator(CreatorPolicy::Tag("viewer".into()))
            .with_cache_policy(CachePolicy::AlwaysRevalidate)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.format.id_convention, IdConvention::JsonLd);
        assert_eq!(config.creator.tag(), Some("viewer"));
        assert_eq!(config.cache_policy, CachePolicy::AlwaysRevalidate);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.url("/query"), "https://store.example.com/query");
    }

    #[test]
    fn default_is_rerum_sandbox() {
        let config = AdapterConfig::default();
        assert_eq!(config.base_url, AdapterConfig::RERUM_SANDBOX_URL);
        assert_eq!(config.history_tip, HistoryTip::RerumHistory);
        assert_eq!(config.format.id_convention, IdConvention::JsonLd);
        assert_eq!(config.endpoints.update, "/patch/");
        assert_eq!(config.endpoints.update_method, HttpMethod::Patch);
        assert_eq!(config.url(&config.endpoints.create), "https://tinydev.rerum.io/create/");
    }

    #[test]
    fn put_endpoints() {
        let config =
            AdapterConfig::new("http://localhost").with_endpoints(Endpoints::standard().with_put_update());
        assert_eq!(config.endpoints.update_method, HttpMethod::Put);
        assert_eq!(config.url(&config.endpoints.update), "http://localhost/update");
    }
}
