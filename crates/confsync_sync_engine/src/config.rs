//! Configuration for the sync engine.

/// Default cap of concurrent filesystem jobs.
pub const DEFAULT_MAX_LOCAL_WORKERS: usize = 32;
/// Default cap of concurrent API requests.
pub const DEFAULT_MAX_REMOTE_REQUESTS: usize = 16;
/// Default cap of concurrent ticket requests.
pub const DEFAULT_MAX_TICKET_REQUESTS: usize = 8;

/// Configuration for engine operations.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Storage API host, e.g. `connection.keboola.com`.
    pub api_host: String,
    /// Storage API token.
    pub api_token: String,
    /// Encryption API host. Derived from the storage host when empty.
    pub encryption_host: String,
    /// Description attached to every remote write.
    pub change_description: String,
    /// Cap of concurrent filesystem jobs.
    pub max_local_workers: usize,
    /// Cap of concurrent API requests within one level.
    pub max_remote_requests: usize,
    /// Cap of concurrent ticket requests.
    pub max_ticket_requests: usize,
}

impl EngineConfig {
    /// Creates a configuration for an API host and token.
    pub fn new(api_host: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            api_token: api_token.into(),
            encryption_host: String::new(),
            change_description: String::new(),
            max_local_workers: DEFAULT_MAX_LOCAL_WORKERS,
            max_remote_requests: DEFAULT_MAX_REMOTE_REQUESTS,
            max_ticket_requests: DEFAULT_MAX_TICKET_REQUESTS,
        }
    }

    /// Sets the change description.
    pub fn with_change_description(mut self, description: impl Into<String>) -> Self {
        self.change_description = description.into();
        self
    }

    /// Sets the encryption API host.
    pub fn with_encryption_host(mut self, host: impl Into<String>) -> Self {
        self.encryption_host = host.into();
        self
    }

    /// Sets the cap of concurrent filesystem jobs.
    pub fn with_max_local_workers(mut self, max: usize) -> Self {
        self.max_local_workers = max;
        self
    }

    /// Sets the cap of concurrent API requests.
    pub fn with_max_remote_requests(mut self, max: usize) -> Self {
        self.max_remote_requests = max;
        self
    }

    /// Sets the cap of concurrent ticket requests.
    pub fn with_max_ticket_requests(mut self, max: usize) -> Self {
        self.max_ticket_requests = max;
        self
    }

    /// Encryption host, derived from the storage host if not set:
    /// `connection.x` becomes `encryption.x`.
    #[must_use]
    pub fn encryption_host(&self) -> String {
        if !self.encryption_host.is_empty() {
            return self.encryption_host.clone();
        }
        let host = strip_scheme(&self.api_host);
        match host.strip_prefix("connection.") {
            Some(rest) => format!("encryption.{rest}"),
            None => host.to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Host without a leading `http://` or `https://`.
#[must_use]
pub fn strip_scheme(host: &str) -> &str {
    host.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = EngineConfig::new("connection.keboola.com", "token")
            .with_change_description("sync")
            .with_max_remote_requests(4);
        assert_eq!(config.max_local_workers, DEFAULT_MAX_LOCAL_WORKERS);
        assert_eq!(config.max_remote_requests, 4);
        assert_eq!(config.change_description, "sync");
    }

    #[test]
    fn derived_encryption_host() {
        let config = EngineConfig::new("https://connection.north-europe.azure.keboola.com/", "t");
        assert_eq!(
            config.encryption_host(),
            "encryption.north-europe.azure.keboola.com"
        );
        let config = EngineConfig::new("localhost:8080", "t").with_encryption_host("enc:1");
        assert_eq!(config.encryption_host(), "enc:1");
    }
}
