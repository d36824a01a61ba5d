use crate::amqp::configuration::RabbitMqSettings;
use crate::providers::{
    CachedConnectionProvider, ConnectionProvider, DetailsConnectionProvider,
    LocalConnectionProvider, UriConnectionProvider,
};
use redact::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
/// Which [`ConnectionProvider`] to use, as it appears in an application's configuration.
///
/// # Example
///
/// ```rust
/// use carrot_cake_connections::providers::ConnectionProviderSettings;
///
/// let settings: ConnectionProviderSettings = serde_json::from_str(
///     r#"{
///         "strategy": "details",
///         "host": "localhost",
///         "port": "5672",
///         "cache": { "automatic_release": true }
///     }"#,
/// )
/// .unwrap();
/// let provider = settings.build().unwrap();
/// ```
pub struct ConnectionProviderSettings {
    #[serde(flatten)]
    pub strategy: ProviderStrategy,
    /// Share a single connection across all callers.
    /// If omitted, every caller gets its own connection.
    #[serde(default)]
    pub cache: Option<CacheSettings>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ProviderStrategy {
    /// See [`LocalConnectionProvider`].
    Local,
    /// See [`UriConnectionProvider`].
    Uri { uri: Secret<String> },
    /// See [`DetailsConnectionProvider`].
    Details(RabbitMqSettings),
}

#[derive(Debug, Deserialize, Clone)]
/// Configuration of a [`CachedConnectionProvider`].
pub struct CacheSettings {
    #[serde(default = "default_automatic_release")]
    pub automatic_release: bool,
}

fn default_automatic_release() -> bool {
    true
}

impl ConnectionProviderSettings {
    /// Build the configured provider.
    ///
    /// It fails if the configuration is invalid (e.g. a malformed connection URI).
    pub fn build(&self) -> Result<Box<dyn ConnectionProvider>, anyhow::Error> {
        let provider: Box<dyn ConnectionProvider> = match &self.strategy {
            ProviderStrategy::Local => Box::new(LocalConnectionProvider::instance()),
            ProviderStrategy::Uri { uri } => {
                Box::new(UriConnectionProvider::new(uri.expose_secret())?)
            }
            ProviderStrategy::Details(settings) => {
                Box::new(DetailsConnectionProvider::from_settings(settings.clone()))
            }
        };
        let Some(cache) = &self.cache else {
            return Ok(provider);
        };
        let cached = CachedConnectionProvider::new(provider)
            .with_automatic_release(cache.automatic_release);
        Ok(Box::new(cached))
    }
}
