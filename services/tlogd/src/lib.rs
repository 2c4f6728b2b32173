//! HTTP daemon for a transparency log and the aggregator that queries its
//! peers.

pub mod auth;
pub mod client;
pub mod config;
pub mod routes;
pub mod state;
pub mod wire;
