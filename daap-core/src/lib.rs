//! The DAAP library model: a revision-tracked tree of databases, items
//! and containers, the response builders that render it as DMAP, and
//! the provider/session protocol that drives long-polling clients.
//! Knows nothing about HTTP, Zeroconf or on-disk media — that's
//! `daap-server`'s job.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod response;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{Container, ContainerItem, Database, Item, Library};
pub use provider::{MediaSource, MediaStream, Provider, Session};
pub use response::Capabilities;
pub use store::Revision;
