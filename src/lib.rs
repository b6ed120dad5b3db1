//! xdbe - X11 server core with the DOUBLE-BUFFER extension
//!
//! Clients name back buffers for their windows, draw into them and swap
//! front and back buffers of many windows in one request. Buffer storage and
//! swapping are delegated to a per-screen backend.

pub mod client;
pub mod config;
pub mod dbe;
pub mod drawable;
pub mod error;
pub mod gc;
pub mod objects;
pub mod resource;
pub mod server;
pub mod setup;
pub mod window;
pub mod wire;

pub use config::ServerConfig;
pub use error::ProtocolError;
pub use server::X11Server;
