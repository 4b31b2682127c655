//! Mediagate-Remote: FTP and FTPS media sources.
//!
//! [`RemoteChannel`] keeps the registry of configured sources, one control
//! session per source for listings and size queries, and opens a dedicated
//! connection for every ranged read. The wire protocol sits behind the
//! [`Connector`] and [`FtpSession`] traits; [`SuppaConnector`] talks to
//! real servers. The `testing` feature adds `memory::MemoryConnector`, an
//! in-memory server for tests.

pub mod channel;
pub mod config;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod session;

pub use channel::{RemoteChannel, RemoteMedia};
pub use config::{RemoteConfig, RemoteSourceConfig, TrustPolicy};
pub use session::{Connector, FtpSession, RemoteEntry, SuppaConnector};
