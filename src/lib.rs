//! Mediagate - local media delivery gateway
//!
//! This library crate exposes the gateway for the binary and for
//! integration testing.

pub mod config;
pub mod server;
pub mod streaming;
pub mod subtitles;
