use crate::helpers::{all_plain_providers, UNREACHABLE_PORT};
use carrot_cake_connections::providers::{
    ConnectError, ConnectionProvider, DetailsConnectionProvider, LocalConnectionProvider,
    UriConnectionProvider,
};

#[tokio::test]
async fn local_provider_opens_a_new_connection_on_every_call() {
    // Arrange
    let provider = LocalConnectionProvider::instance();

    // Act
    let first = provider.get().await.unwrap();
    let second = provider.get().await.unwrap();

    // Assert
    assert_ne!(first, second);
    assert!(first.is_open());
    assert!(second.is_open());

    provider.release(&first).await;
    provider.release(&second).await;
    assert!(!first.is_open());
    assert!(!second.is_open());
}

#[tokio::test]
async fn uri_provider_opens_a_new_connection_on_every_call() {
    // Arrange
    let provider = UriConnectionProvider::new("amqp://localhost:5672").unwrap();

    // Act
    let first = provider.get().await.unwrap();
    let second = provider.get().await.unwrap();

    // Assert
    assert_ne!(first, second);

    provider.release(&first).await;
    provider.release(&second).await;
    assert!(!first.is_open());
    assert!(!second.is_open());
}

#[tokio::test]
async fn every_plain_provider_hands_out_independent_connections() {
    for (name, provider) in all_plain_providers() {
        // Act
        let mut connections = Vec::new();
        for _ in 0..3 {
            connections.push(provider.get().await.unwrap());
        }

        // Assert
        for (i, connection) in connections.iter().enumerate() {
            assert!(connection.is_open(), "{name}: connection {i} is closed");
            for other in &connections[i + 1..] {
                assert_ne!(connection, other, "{name}: connections are shared");
            }
        }

        // Closing one connection leaves the others untouched.
        provider.release(&connections[0]).await;
        assert!(!connections[0].is_open(), "{name}");
        assert!(connections[1..].iter().all(|c| c.is_open()), "{name}");

        for connection in &connections[1..] {
            provider.release(connection).await;
        }
    }
}

#[tokio::test]
async fn releasing_a_closed_connection_does_not_fail() {
    for (name, provider) in all_plain_providers() {
        // Arrange
        let connection = provider.get().await.unwrap();

        // Act
        provider.release(&connection).await;
        provider.release(&connection).await;

        // Assert
        assert!(!connection.is_open(), "{name}");
    }
}

#[tokio::test]
async fn connected_handles_can_open_channels() {
    // Arrange
    let provider = DetailsConnectionProvider::new("localhost", 5672);
    let connection = provider.get().await.unwrap();

    // Act
    let channel = connection.create_channel().await;

    // Assert
    assert!(channel.is_ok());
    provider.release(&connection).await;
}

#[tokio::test]
async fn fallback_addresses_are_used_when_the_primary_broker_is_unreachable() {
    // Arrange
    let provider = DetailsConnectionProvider::new("localhost", UNREACHABLE_PORT)
        .with_fallback_addresses(vec![
            carrot_cake_connections::amqp::configuration::BrokerAddress::new("localhost", 5672),
        ]);

    // Act
    let connection = provider.get().await.unwrap();

    // Assert
    assert!(connection.is_open());
    provider.release(&connection).await;
}

#[tokio::test]
async fn wrong_credentials_are_reported_as_a_connect_error() {
    // Arrange
    let provider =
        DetailsConnectionProvider::new("localhost", 5672).with_credentials("guest", "not-guest");

    // Act
    let outcome = provider.get().await;

    // Assert
    assert!(matches!(outcome, Err(ConnectError::Broker(_))));
}
