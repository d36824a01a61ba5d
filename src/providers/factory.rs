use crate::amqp::configuration::BrokerAddress;
use crate::amqp::{Connection, ConnectionFactory};
use crate::providers::{close_if_open, ConnectError, ConnectionProvider};

/// Opens connections using a pre-configured [`ConnectionFactory`].
///
/// Useful when the factory needs customisations that are not expressible via settings,
/// e.g. a custom TLS connector.
#[derive(Clone)]
pub struct FactoryConnectionProvider {
    factory: ConnectionFactory,
}

impl FactoryConnectionProvider {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self { factory }
    }

    /// Connect to `host`:`port` instead of the address the factory was configured with.
    ///
    /// It returns a new provider: the wrapped factory is left untouched.
    #[must_use]
    pub fn with_host_and_port(&self, host: impl Into<String>, port: u16) -> Self {
        Self {
            factory: self.factory.clone().with_host_and_port(host, port),
        }
    }

    /// Try `addresses` in order when connecting, instead of the address the factory was
    /// configured with.
    ///
    /// It returns a new provider: the wrapped factory is left untouched.
    #[must_use]
    pub fn with_hosts_and_ports<I>(&self, addresses: I) -> Self
    where
        I: IntoIterator<Item = BrokerAddress>,
    {
        Self {
            factory: self.factory.clone().with_addresses(addresses),
        }
    }

    pub fn factory(&self) -> &ConnectionFactory {
        &self.factory
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for FactoryConnectionProvider {
    #[tracing::instrument(name = "factory_provider_get", skip(self))]
    async fn get(&self) -> Result<Connection, ConnectError> {
        self.factory.open().await
    }

    async fn release(&self, connection: &Connection) {
        close_if_open(connection).await
    }
}
