//! QUIC transport for negotiation messages.
//!
//! [`CsiServer`] answers [`CsiMessage`] requests over QUIC bi-directional
//! streams using `quinn`; [`CsiClient`] issues them.  [`tls`] builds the
//! rustls configuration both sides need.
//!
//! [`CsiClient`]: client::CsiClient
//! [`CsiServer`]: server::CsiServer
//! [`CsiMessage`]: crate::message::CsiMessage

pub mod client;
pub mod server;
pub mod tls;
