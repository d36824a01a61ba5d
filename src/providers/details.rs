use crate::amqp::configuration::{BrokerAddress, RabbitMqSettings, RabbitMqTlsSettings};
use crate::amqp::{Connection, ConnectionFactory};
use crate::providers::{close_if_open, ConnectError, ConnectionProvider};
use std::time::Duration;

/// Connects to a RabbitMq broker described by its host, port, credentials and virtual host.
///
/// # How do I build a `DetailsConnectionProvider`?
///
/// Start from [`DetailsConnectionProvider::new`] and customise it using the `with_*` methods.
/// Each of them returns a new provider, leaving the original one untouched.
///
/// ```rust
/// use carrot_cake_connections::providers::DetailsConnectionProvider;
///
/// let provider = DetailsConnectionProvider::new("localhost", 5672)
///     .with_credentials("pipeline", "s3cr3t")
///     .with_virtual_host("ingestion")
///     .with_connection_name("xml-ingestion");
/// ```
#[derive(Debug, Clone)]
pub struct DetailsConnectionProvider {
    settings: RabbitMqSettings,
}

impl DetailsConnectionProvider {
    /// Connect to `host`:`port` using the default `guest` credentials and the `/` virtual host.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            settings: RabbitMqSettings::new(host, port),
        }
    }

    /// Build a provider out of fully specified settings.
    pub fn from_settings(settings: RabbitMqSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RabbitMqSettings {
        &self.settings
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password: String = password.into();
        self.settings.username = username.into();
        self.settings.password = password.into();
        self
    }

    #[must_use]
    pub fn with_virtual_host(mut self, vhost: impl Into<String>) -> Self {
        self.settings.vhost = vhost.into();
        self
    }

    /// Brokers to try, in order, after the primary one.
    #[must_use]
    pub fn with_fallback_addresses<I>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = BrokerAddress>,
    {
        self.settings.fallback_addresses = addresses.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_tls(mut self, tls: RabbitMqTlsSettings) -> Self {
        self.settings.tls = Some(tls);
        self
    }

    /// Heartbeat interval requested to the broker.
    ///
    /// Sub-second precision is dropped, and intervals longer than `u16::MAX` seconds are
    /// capped to `u16::MAX` seconds.
    #[must_use]
    pub fn with_requested_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.settings.heartbeat_seconds =
            Some(heartbeat.as_secs().try_into().unwrap_or(u16::MAX));
        self
    }

    #[must_use]
    pub fn with_channel_max(mut self, channel_max: u16) -> Self {
        self.settings.channel_max = Some(channel_max);
        self
    }

    #[must_use]
    pub fn with_frame_max(mut self, frame_max: u32) -> Self {
        self.settings.frame_max = Some(frame_max);
        self
    }

    /// Timeout observed on each connection attempt.
    ///
    /// Sub-second precision is dropped.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connection_timeout_seconds = Some(timeout.as_secs());
        self
    }

    #[must_use]
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.settings.connection_name = Some(name.into());
        self
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for DetailsConnectionProvider {
    #[tracing::instrument(name = "details_provider_get", skip(self))]
    async fn get(&self) -> Result<Connection, ConnectError> {
        ConnectionFactory::new_from_config(&self.settings)
            .map_err(ConnectError::configuration)?
            .open()
            .await
    }

    async fn release(&self, connection: &Connection) {
        close_if_open(connection).await
    }
}
