use crate::helpers::{all_plain_providers, UNREACHABLE_PORT};
use carrot_cake_connections::providers::{
    CachedConnectionProvider, ConnectError, ConnectionProvider, DetailsConnectionProvider,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn with_automatic_release_the_connection_is_closed_by_the_last_holder() {
    for (name, provider) in all_plain_providers() {
        // Arrange
        let provider = CachedConnectionProvider::new(provider);

        // Act
        let first = provider.get().await.unwrap();
        let second = provider.get().await.unwrap();

        // Assert
        assert_eq!(first, second, "{name}");

        provider.release(&first).await;
        assert!(first.is_open(), "{name}");
        assert!(second.is_open(), "{name}");

        provider.release(&second).await;
        assert!(!first.is_open(), "{name}");
        assert!(!second.is_open(), "{name}");
    }
}

#[tokio::test]
async fn without_automatic_release_the_first_release_closes_the_connection() {
    for (name, provider) in all_plain_providers() {
        // Arrange
        let provider = CachedConnectionProvider::new(provider).with_automatic_release(false);

        // Act
        let first = provider.get().await.unwrap();
        let second = provider.get().await.unwrap();
        assert_eq!(first, second, "{name}");
        provider.release(&first).await;

        // Assert
        assert!(!first.is_open(), "{name}");
        assert!(!second.is_open(), "{name}");

        // Releasing again is harmless.
        provider.release(&second).await;
    }
}

#[tokio::test]
async fn details_provider_shares_a_connection_until_both_holders_release_it() {
    // Arrange
    let provider = CachedConnectionProvider::new(DetailsConnectionProvider::new("localhost", 5672));

    // Act
    let first = provider.get().await.unwrap();
    let second = provider.get().await.unwrap();

    // Assert
    assert_eq!(first, second);
    assert!(first.is_open() && second.is_open());
    provider.release(&first).await;
    assert!(first.is_open() && second.is_open());
    provider.release(&second).await;
    assert!(!first.is_open() && !second.is_open());
}

#[tokio::test]
async fn a_failed_connection_attempt_does_not_poison_the_provider() {
    // Arrange
    let provider = CachedConnectionProvider::new(
        DetailsConnectionProvider::new("localhost", UNREACHABLE_PORT)
            .with_connection_timeout(Duration::from_secs(5)),
    )
    .with_automatic_release(false);

    // Act
    let first = provider.get().await;
    let second = provider.get().await;
    let third = tokio::time::timeout(Duration::from_secs(10), provider.get()).await;

    // Assert
    assert!(matches!(first, Err(ConnectError::Broker(_))));
    assert!(matches!(second, Err(ConnectError::Broker(_))));
    assert!(matches!(third, Ok(Err(ConnectError::Broker(_)))));
}

#[tokio::test]
async fn concurrent_stages_share_one_connection() {
    // Arrange
    let provider = Arc::new(CachedConnectionProvider::new(
        DetailsConnectionProvider::new("localhost", 5672),
    ));

    // Act
    let stages: Vec<_> = (0..8)
        .map(|_| {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.get().await.unwrap() })
        })
        .collect();
    let mut connections = Vec::new();
    for stage in stages {
        connections.push(stage.await.unwrap());
    }

    // Assert
    assert!(connections.iter().all(|c| *c == connections[0]));
    for connection in &connections {
        assert!(connection.is_open());
        provider.release(connection).await;
    }
    assert!(!connections[0].is_open());
}
