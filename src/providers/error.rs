use std::sync::Arc;

/// Error returned when a connection to the RabbitMq broker could not be established.
///
/// `ConnectError` is cheap to clone: when several callers are waiting on the same connection
/// attempt, each one of them gets a copy of the same failure.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConnectError {
    #[error("Failed to connect to the RabbitMq broker")]
    Broker(#[source] Arc<lapin::Error>),
    #[error("Timed out after {0:?} while trying to connect to the RabbitMq broker")]
    Timeout(std::time::Duration),
    #[error("Invalid configuration for the connection to the RabbitMq broker")]
    Configuration(#[source] Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl ConnectError {
    pub(crate) fn configuration(error: anyhow::Error) -> Self {
        let error: Box<dyn std::error::Error + Send + Sync + 'static> = error.into();
        Self::Configuration(error.into())
    }
}

impl From<lapin::Error> for ConnectError {
    fn from(err: lapin::Error) -> Self {
        Self::Broker(Arc::new(err))
    }
}
