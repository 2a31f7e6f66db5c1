//! This crate reads data from the Online Scout Manager (OSM) API.
//!
//! Every query goes through an [`Accessor`], which attaches a [`Credential`], serves answers from a local [`Cache`](cache::Cache)
//! when it can, and slows down when OSM says its rate limit is close. \
//! Queries can be issued directly with [`Accessor::call`], but most callers will rather use the object graph:
//! an [`Osm`] discovers the sections of the user, and each [`Section`] fetches its terms, members, events, programme...
//!
//! ```no_run
//! # async fn run() -> Result<(), osm_accessor::OsmError> {
//! use std::path::Path;
//! use osm_accessor::{config, Accessor, Cache, Osm, OsmOptions};
//!
//! let credential = config::credential_from_env(Path::new(config::DEFAULT_CREDENTIALS_FILE))?;
//! let cache = Cache::load_or_new(Path::new(config::DEFAULT_CACHE_FILE));
//! let accessor = Accessor::new(config::DEFAULT_BASE_URL, credential, cache)?;
//!
//! let osm: Osm = Osm::new(&accessor, OsmOptions::default()).await?;
//! for section in osm.sections() {
//!     println!("{} has {} members", section.name(), section.members().map(|m| m.len()).unwrap_or(0));
//! }
//! accessor.save_cache()?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod error;
pub use error::{OsmError, TransportFailure};
pub mod record;
pub use record::{Lookup, Record};

pub mod client;
pub mod cache;
pub use cache::Cache;
pub mod rate_limit;
pub mod credential;
pub use credential::Credential;
pub mod accessor;
pub use accessor::Accessor;

pub mod term;
pub use term::{Term, TermSelection};
pub mod member;
pub use member::{Member, Members};
pub mod event;
pub use event::Event;
pub mod programme;
pub use programme::{Meeting, Programme};
pub mod movers;
pub use movers::Movers;
pub mod badge;
pub mod user;
pub use user::Users;
pub mod section;
pub use section::{ObjectTypes, Section};
pub mod osm;
pub use osm::{Osm, OsmOptions};

pub mod config;
pub mod utils;

#[cfg(test)]
mod mock_transport;
