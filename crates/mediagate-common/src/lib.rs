//! Mediagate-Common: shared types and utilities.
//!
//! - **Error Handling**: the [`Error`] taxonomy every crate funnels into, with
//!   an HTTP status mapping for the gateway.
//! - **Containers**: [`Container`] classification deciding between direct
//!   range serving and live transcoding.
//! - **Path Utilities**: extension checks shared by local and remote listings.
//! - **Streams**: the boxed [`ByteStream`] every byte source hands to the
//!   gateway.
//!
//! # Examples
//!
//! ```
//! use mediagate_common::{Container, Error};
//! use mediagate_common::paths::is_video_name;
//!
//! assert!(is_video_name("/movies/Heat (1995).mkv"));
//! assert!(Container::from_name("Heat (1995).mkv").needs_transcode());
//!
//! let err = Error::configuration("no remote sources configured");
//! assert_eq!(err.http_status(), 503);
//! ```

pub mod error;
pub mod media;
pub mod paths;
pub mod stream;

pub use error::{Error, Result};
pub use media::Container;
pub use stream::ByteStream;
