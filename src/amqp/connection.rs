use lapin::ConnectionState;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A physical session with a RabbitMq broker.
///
/// Implemented for [`lapin::Connection`]. Other implementations are mostly useful in tests,
/// where a broker is not available.
#[async_trait::async_trait]
pub trait RawConnection: Send + Sync + 'static {
    /// `true` until the session has been closed, either by us or by the broker.
    fn is_open(&self) -> bool;

    /// Close the session.
    async fn close(&self) -> Result<(), anyhow::Error>;

    /// Access the underlying `lapin` connection, if there is one.
    fn as_lapin(&self) -> Option<&lapin::Connection> {
        None
    }
}

#[async_trait::async_trait]
impl RawConnection for lapin::Connection {
    fn is_open(&self) -> bool {
        matches!(self.status().state(), ConnectionState::Connected)
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        lapin::Connection::close(self, 200, "OK")
            .await
            .map_err(Into::into)
    }

    fn as_lapin(&self) -> Option<&lapin::Connection> {
        Some(self)
    }
}

/// A handle to a connection with a RabbitMq broker.
///
/// Cloning a `Connection` is cheap: all clones refer to the same physical connection and
/// compare equal. Two handles obtained from separate connection attempts never compare equal,
/// even if they point at the same broker.
#[derive(Clone)]
pub struct Connection {
    id: Uuid,
    raw: Arc<dyn RawConnection>,
}

impl Connection {
    /// Wrap a freshly established physical connection.
    pub fn new<C: RawConnection>(raw: C) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw: Arc::new(raw),
        }
    }

    /// Unique identifier of the physical connection behind this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.raw.is_open()
    }

    /// Close the physical connection.
    ///
    /// All handles referring to the same connection will report closed afterwards.
    pub async fn close(&self) -> Result<(), anyhow::Error> {
        self.raw.close().await
    }

    /// The underlying `lapin` connection, e.g. to create channels.
    ///
    /// It returns `None` if the connection is not backed by `lapin`.
    pub fn lapin(&self) -> Option<&lapin::Connection> {
        self.raw.as_lapin()
    }

    /// Open a new channel on top of this connection.
    #[tracing::instrument(
        name = "rabbitmq_create_channel",
        skip(self),
        fields(connection_id = %self.id)
    )]
    pub async fn create_channel(&self) -> Result<lapin::Channel, anyhow::Error> {
        let connection = self
            .lapin()
            .ok_or_else(|| anyhow::anyhow!("The connection is not backed by a RabbitMq client."))?;
        Ok(connection.create_channel().await?)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}
