use crate::amqp::Connection;
use crate::providers::{ConnectError, ConnectionProvider};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type ConnectAttempt = Shared<BoxFuture<'static, Result<Connection, ConnectError>>>;
type CloseAttempt = Shared<BoxFuture<'static, ()>>;

/// Shares a single connection across all its callers.
///
/// The connection is opened lazily, using the wrapped provider, on the first call to
/// [`get`](ConnectionProvider::get). Subsequent calls get a handle to the same connection
/// and increment a reference count, which is decremented by each call to
/// [`release`](ConnectionProvider::release).
///
/// # Automatic release
///
/// By default the connection is closed when the last holder releases it, and a new one is
/// opened on the next `get`.
/// Using [`with_automatic_release(false)`](CachedConnectionProvider::with_automatic_release)
/// the connection is instead closed as soon as _any_ holder releases it: handles held by other
/// callers will report the connection as closed.
///
/// The connection is closed on a task spawned onto the current Tokio runtime: a `release`
/// that gets cancelled half-way does not leave the connection open.
///
/// # Concurrency
///
/// At most one connection attempt is in flight at any point in time: callers arriving while
/// the connection is being established wait for that attempt and share its outcome, success or
/// failure. A failed attempt leaves no trace: the next call to `get` tries again.
///
/// ```rust
/// use carrot_cake_connections::providers::{
///     CachedConnectionProvider, ConnectionProvider, DetailsConnectionProvider,
/// };
/// use std::sync::Arc;
///
/// async fn example() -> anyhow::Result<()> {
///     let provider = Arc::new(CachedConnectionProvider::new(
///         DetailsConnectionProvider::new("localhost", 5672),
///     ));
///
///     let first = provider.get().await?;
///     let second = provider.get().await?;
///     assert_eq!(first, second);
///
///     provider.release(&first).await;
///     assert!(second.is_open());
///     provider.release(&second).await;
///     assert!(!second.is_open());
///     Ok(())
/// }
/// ```
pub struct CachedConnectionProvider<P> {
    delegate: Arc<P>,
    automatic_release: bool,
    state: Mutex<CacheState>,
    attempts: AtomicU64,
}

#[derive(Default)]
enum CacheState {
    #[default]
    Empty,
    Connecting {
        attempt: u64,
        outcome: ConnectAttempt,
    },
    /// `holders` is never zero.
    Connected {
        connection: Connection,
        holders: usize,
    },
    /// `done` runs on its own task, so it completes even if every releaser is cancelled.
    Closing {
        attempt: u64,
        connection: Connection,
        done: CloseAttempt,
    },
}

enum Wait {
    Connect(u64, ConnectAttempt),
    Close(u64, CloseAttempt),
}

impl<P> CachedConnectionProvider<P>
where
    P: ConnectionProvider + 'static,
{
    /// Share the connections opened by `delegate`, with automatic release enabled.
    pub fn new(delegate: P) -> Self {
        Self {
            delegate: Arc::new(delegate),
            automatic_release: true,
            state: Mutex::new(CacheState::Empty),
            attempts: AtomicU64::new(0),
        }
    }

    /// Enable or disable automatic release.
    ///
    /// If disabled, the first call to [`release`](ConnectionProvider::release) closes the
    /// shared connection, regardless of how many callers are still holding it.
    #[must_use]
    pub fn with_automatic_release(mut self, automatic_release: bool) -> Self {
        self.automatic_release = automatic_release;
        self
    }

    /// `true` if the shared connection is only closed when its last holder releases it.
    pub fn automatic_release(&self) -> bool {
        self.automatic_release
    }

    /// The provider used to open and close the shared connection.
    pub fn delegate(&self) -> &P {
        &self.delegate
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // The state is always left consistent before any operation that could panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::Relaxed)
    }

    /// Join the shared connection if there is one, otherwise figure out what to wait for.
    fn join_or_wait(&self) -> Result<Connection, Wait> {
        let mut state = self.state();
        match &mut *state {
            CacheState::Connected {
                connection,
                holders,
            } => {
                *holders += 1;
                debug!(
                    connection_id = %connection.id(),
                    holders = *holders,
                    "Sharing cached RabbitMQ connection."
                );
                Ok(connection.clone())
            }
            CacheState::Connecting { attempt, outcome } => {
                debug!("Waiting on the in-flight RabbitMQ connection attempt.");
                Err(Wait::Connect(*attempt, outcome.clone()))
            }
            CacheState::Closing { attempt, done, .. } => {
                debug!("Waiting for the cached RabbitMQ connection to be closed.");
                Err(Wait::Close(*attempt, done.clone()))
            }
            CacheState::Empty => {
                let attempt = self.next_attempt();
                let delegate = Arc::clone(&self.delegate);
                let outcome = async move { delegate.get().await }.boxed().shared();
                *state = CacheState::Connecting {
                    attempt,
                    outcome: outcome.clone(),
                };
                Err(Wait::Connect(attempt, outcome))
            }
        }
    }

    /// Record the outcome of a connection attempt.
    ///
    /// Returns `None` if the connection was torn down before we could join it.
    fn settle(
        &self,
        attempt: u64,
        outcome: Result<Connection, ConnectError>,
    ) -> Option<Result<Connection, ConnectError>> {
        let mut state = self.state();
        let (next, result) = match (std::mem::take(&mut *state), outcome) {
            (CacheState::Connecting { attempt: current, .. }, Ok(connection))
                if current == attempt =>
            {
                debug!(connection_id = %connection.id(), "Cached a new RabbitMQ connection.");
                let next = CacheState::Connected {
                    connection: connection.clone(),
                    holders: 1,
                };
                (next, Some(Ok(connection)))
            }
            (
                CacheState::Connected {
                    connection: cached,
                    holders,
                },
                Ok(connection),
            ) if cached == connection => {
                let next = CacheState::Connected {
                    connection: cached,
                    holders: holders + 1,
                };
                (next, Some(Ok(connection)))
            }
            (CacheState::Connecting { attempt: current, .. }, Err(e)) if current == attempt => {
                debug!(error = %e, "Failed to open the shared RabbitMQ connection.");
                (CacheState::Empty, Some(Err(e)))
            }
            (current, Err(e)) => (current, Some(Err(e))),
            (current, Ok(_)) => (current, None),
        };
        *state = next;
        result
    }

    /// Drop one holder of `connection`.
    ///
    /// Returns the teardown to wait for if the shared connection has to be closed, or is
    /// already being closed.
    fn begin_release(&self, connection: &Connection) -> Option<(u64, CloseAttempt)> {
        let mut state = self.state();
        match &mut *state {
            CacheState::Connected {
                connection: cached,
                holders,
            } if cached == connection => {
                *holders -= 1;
                if *holders > 0 && self.automatic_release {
                    debug!(
                        holders = *holders,
                        "Released a handle to the shared RabbitMQ connection."
                    );
                    return None;
                }
                let cached = cached.clone();
                let attempt = self.next_attempt();
                let delegate = Arc::clone(&self.delegate);
                let teardown = tokio::spawn({
                    let cached = cached.clone();
                    async move { delegate.release(&cached).await }
                });
                let done = async move {
                    if let Err(e) = teardown.await {
                        debug!(error = %e, "The teardown of the shared RabbitMQ connection failed.");
                    }
                }
                .boxed()
                .shared();
                *state = CacheState::Closing {
                    attempt,
                    connection: cached,
                    done: done.clone(),
                };
                Some((attempt, done))
            }
            CacheState::Closing {
                attempt,
                connection: cached,
                done,
            } if cached == connection => {
                debug!("The shared RabbitMQ connection is already being closed.");
                Some((*attempt, done.clone()))
            }
            _ => {
                debug!("Ignoring the release of a connection that is not cached.");
                None
            }
        }
    }

    /// Move from `Closing` to `Empty`, unless someone else already did.
    fn closed(&self, attempt: u64) {
        let mut state = self.state();
        if matches!(&*state, CacheState::Closing { attempt: current, .. } if *current == attempt) {
            *state = CacheState::Empty;
        }
    }
}

#[async_trait::async_trait]
impl<P> ConnectionProvider for CachedConnectionProvider<P>
where
    P: ConnectionProvider + 'static,
{
    #[tracing::instrument(name = "cached_provider_get", skip(self))]
    async fn get(&self) -> Result<Connection, ConnectError> {
        loop {
            match self.join_or_wait() {
                Ok(connection) => return Ok(connection),
                Err(Wait::Connect(attempt, outcome)) => {
                    if let Some(result) = self.settle(attempt, outcome.await) {
                        return result;
                    }
                    debug!("The shared RabbitMQ connection was closed before it could be joined.");
                }
                Err(Wait::Close(attempt, done)) => {
                    done.await;
                    self.closed(attempt);
                }
            }
        }
    }

    #[tracing::instrument(
        name = "cached_provider_release",
        skip(self, connection),
        fields(connection_id = %connection.id())
    )]
    async fn release(&self, connection: &Connection) {
        let Some((attempt, done)) = self.begin_release(connection) else {
            return;
        };
        debug!("Closing the shared RabbitMQ connection.");
        done.await;
        self.closed(attempt);
    }
}
