use carrot_cake_connections::amqp::configuration::RabbitMqSettings;
use carrot_cake_connections::amqp::ConnectionFactory;
use carrot_cake_connections::providers::{
    ConnectionProvider, DetailsConnectionProvider, FactoryConnectionProvider,
    LocalConnectionProvider, UriConnectionProvider,
};

/// A port on which no RabbitMq broker is listening.
pub const UNREACHABLE_PORT: u16 = 5673;

pub fn get_rabbitmq_settings() -> RabbitMqSettings {
    RabbitMqSettings::default()
}

/// One instance of each plain provider, all pointing at the local broker.
pub fn all_plain_providers() -> Vec<(&'static str, Box<dyn ConnectionProvider>)> {
    let factory = ConnectionFactory::new_from_config(&get_rabbitmq_settings()).unwrap();
    let local: Box<dyn ConnectionProvider> = Box::new(LocalConnectionProvider::instance());
    let uri: Box<dyn ConnectionProvider> =
        Box::new(UriConnectionProvider::new("amqp://localhost:5672").unwrap());
    let details: Box<dyn ConnectionProvider> =
        Box::new(DetailsConnectionProvider::new("localhost", 5672));
    let factory: Box<dyn ConnectionProvider> =
        Box::new(FactoryConnectionProvider::new(factory).with_host_and_port("localhost", 5672));
    vec![
        ("local", local),
        ("uri", uri),
        ("details", details),
        ("factory", factory),
    ]
}
