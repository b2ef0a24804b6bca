//! Infrastructure adapters for the access control module.

pub mod http_client;

pub use http_client::ConsoleHttpClient;
