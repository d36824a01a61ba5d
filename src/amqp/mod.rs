//! Helpers for connecting to a rabbitmq broker

pub mod configuration;
mod connection;
mod factory;
pub use connection::{Connection, RawConnection};
pub use factory::ConnectionFactory;

#[cfg(test)]
pub(crate) use connection::testing;
