//! sealgate-gateway: the encrypting record gateway
//!
//! Clients speak a newline-delimited hex protocol over TCP. The gateway
//! seals every record under a fresh per-record key, seals the record id
//! deterministically under a server-wide key, and forwards only ciphertext to
//! a [`sealgate_storage::Backend`].

pub mod backend_server;
pub mod client;
pub mod gateway;
pub mod session;
pub mod wire;

pub use backend_server::BackendResponder;
pub use client::GatewayClient;
pub use gateway::Gateway;
pub use session::{run_session, serve, Responder};
