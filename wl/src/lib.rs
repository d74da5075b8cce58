//! Typed object proxies for the Wayland wire protocol.
//!
//! A [`Connection`] owns a [`Transport`] and a registry that maps every live
//! object id to its [`Interface`] descriptor, its version, and its event
//! handlers. Typed wrappers (the ones in [`protocol`], and the ones `gen`
//! emits for other protocol files) are thin newtypes over [`Proxy`]:
//!
//! ```no_run
//! use wlproxy::Connection;
//!
//! # fn main() -> wlproxy::Result<()> {
//! let conn = Connection::connect_to_env()?;
//! let registry = conn.display().get_registry()?;
//! registry.on_global(|name, interface, version| println!("{name}: {interface} v{version}"))?;
//! conn.roundtrip()?;
//! # Ok(())
//! # }
//! ```
//!
//! Requests are validated against the descriptor before anything is queued.
//! Events are decoded against the descriptor of their target and handed to
//! the handler installed for that event, if any. Once a wrapper has been
//! destroyed, moved from, or has outlived its object, it is inert and every
//! operation on it quietly does nothing.

#![warn(missing_debug_implementations, rust_2018_idioms)]

mod config;
mod connection;
mod dispatch;
mod error;
pub mod interface;
mod object;
pub mod protocol;
mod proxy;
mod sockio;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod testing;

pub use config::{Config, DropPolicy};
pub use connection::{Connection, DISPLAY_ID};
pub use dispatch::{Args, Value};
pub use error::{Error, Result};
pub use interface::{ArgDesc, ArgKind, Interface, MessageDesc};
pub use proxy::{Arg, Object, ObjectRef, Proxy, ProxyState};
pub use sockio::UnixTransport;
pub use transport::{IdAllocator, Transport};
pub use wire::{Fixed, Message, RawMessage};
