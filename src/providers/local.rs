use crate::amqp::{configuration::RabbitMqSettings, Connection, ConnectionFactory};
use crate::providers::{close_if_open, ConnectError, ConnectionProvider};

static INSTANCE: LocalConnectionProvider = LocalConnectionProvider { _private: () };

/// Connects to the RabbitMq broker running on the local machine, using the parameters of an
/// out-of-the-box installation (see [`RabbitMqSettings::default`]).
///
/// There is a single, process-wide instance: use [`LocalConnectionProvider::instance`].
#[derive(Debug)]
pub struct LocalConnectionProvider {
    _private: (),
}

impl LocalConnectionProvider {
    pub fn instance() -> &'static LocalConnectionProvider {
        &INSTANCE
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for LocalConnectionProvider {
    #[tracing::instrument(name = "local_provider_get", skip(self))]
    async fn get(&self) -> Result<Connection, ConnectError> {
        ConnectionFactory::new_from_config(&RabbitMqSettings::default())
            .map_err(ConnectError::configuration)?
            .open()
            .await
    }

    async fn release(&self, connection: &Connection) {
        close_if_open(connection).await
    }
}
