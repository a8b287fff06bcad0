//! The CBP game server: accounts, credentials, tables, the per-table
//! round engine, the per-connection protocol handler, UDP discovery,
//! and the TCP/TLS listener that ties them together.

pub mod accounts;
pub mod cli;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod ids;
pub mod listener;
pub mod logging;
pub mod state;
pub mod tables;
pub mod tls;
