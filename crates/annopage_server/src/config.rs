//! Store configuration.

use annopage_protocol::IdConvention;

/// Configuration for the reference store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Prefix of every assigned id; a random slug is appended.
    pub id_prefix: String,
    /// Key the store writes ids under.
    pub id_convention: IdConvention,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl StoreConfig {
    /// Creates a configuration assigning ids under `id_prefix`.
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: id_prefix.into(),
            id_convention: IdConvention::Plain,
            max_body_bytes: 1024 * 1024,
        }
    }

    /// A RERUM-like store: `@id` keys.
    pub fn rerum(id_prefix: impl Into<String>) -> Self {
        Self::new(id_prefix).with_id_convention(IdConvention::JsonLd)
    }

    /// Sets the id convention.
    pub fn with_id_convention(mut self, convention: IdConvention) -> Self {
        self.id_convention = convention;
        self
    }

    /// Sets the body size limit.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Builds a full id from a slug.
    pub fn id_for(&self, slug: &str) -> String {
        format!("{}/{}", self.id_prefix.trim_end_matches('/'), slug)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("http://localhost:3001/v1/id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.id_convention, IdConvention::Plain);
        assert_eq!(config.id_for("abc"), "http://localhost:3001/v1/id/abc");
    }

    #[test]
    fn config_builder() {
        let config = StoreConfig::rerum("https://store.example/v1/id/").with_max_body_bytes(64);

        assert_eq!(config.id_convention, IdConvention::JsonLd);
        assert_eq!(config.max_body_bytes, 64);
        assert_eq!(config.id_for("x"), "https://store.example/v1/id/x");
    }
}
