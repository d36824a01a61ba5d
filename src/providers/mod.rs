//! Strategies to obtain connections to a RabbitMq broker.
//!
//! Every strategy implements [`ConnectionProvider`]:
//! - [`LocalConnectionProvider`], for a broker running on the local machine;
//! - [`UriConnectionProvider`], configured via a connection URI;
//! - [`DetailsConnectionProvider`], configured via host, port, credentials and tuning knobs;
//! - [`FactoryConnectionProvider`], wrapping a pre-built [`ConnectionFactory`].
//!
//! Each of them opens a brand-new connection on every call to [`ConnectionProvider::get`].
//! Wrap any of them in a [`CachedConnectionProvider`] to share a single connection across
//! all callers.
//!
//! [`ConnectionFactory`]: crate::amqp::ConnectionFactory
use crate::amqp::Connection;
use std::sync::Arc;
use tracing::debug;

mod cached;
mod details;
mod error;
mod factory;
mod local;
mod settings;
mod uri;

pub use cached::CachedConnectionProvider;
pub use details::DetailsConnectionProvider;
pub use error::ConnectError;
pub use factory::FactoryConnectionProvider;
pub use local::LocalConnectionProvider;
pub use settings::{CacheSettings, ConnectionProviderSettings, ProviderStrategy};
pub use uri::UriConnectionProvider;

/// A source of connections to a RabbitMq broker.
///
/// Callers obtain a connection with [`get`](ConnectionProvider::get) and hand it back with
/// [`release`](ConnectionProvider::release) once they are done with it.
#[async_trait::async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Get an open connection.
    ///
    /// Fails if the broker cannot be reached or rejects the handshake.
    ///
    /// # Note
    ///
    /// Whether a new connection is established or an existing one is returned
    /// is up to the specific implementation.
    async fn get(&self) -> Result<Connection, ConnectError>;

    /// Hand a connection back to the provider.
    ///
    /// Releasing a connection that is already closed, or that was not handed out by this
    /// provider, is a no-op.
    async fn release(&self, connection: &Connection);
}

#[async_trait::async_trait]
impl<'a, P: ConnectionProvider + ?Sized> ConnectionProvider for &'a P {
    async fn get(&self) -> Result<Connection, ConnectError> {
        (**self).get().await
    }

    async fn release(&self, connection: &Connection) {
        (**self).release(connection).await
    }
}

#[async_trait::async_trait]
impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    async fn get(&self) -> Result<Connection, ConnectError> {
        (**self).get().await
    }

    async fn release(&self, connection: &Connection) {
        (**self).release(connection).await
    }
}

#[async_trait::async_trait]
impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Box<P> {
    async fn get(&self) -> Result<Connection, ConnectError> {
        (**self).get().await
    }

    async fn release(&self, connection: &Connection) {
        (**self).release(connection).await
    }
}

/// Close `connection` unless it has already been closed.
///
/// Failures are absorbed: the connection is gone either way.
pub(crate) async fn close_if_open(connection: &Connection) {
    if !connection.is_open() {
        debug!(connection_id = %connection.id(), "Connection already closed.");
        return;
    }
    if let Err(e) = connection.close().await {
        debug!(
            connection_id = %connection.id(),
            error = ?e,
            "Failed to close RabbitMQ connection."
        );
    }
}
