pub mod cache;
pub mod client;
pub mod data_client;
pub mod error;
pub mod handle;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod test_server;

pub use client::ChatNetwork;
pub use data_client::{DataClient, GraphqlClient};
pub use error::ClientError;
pub use handle::{ClientHandle, MessageSink};
