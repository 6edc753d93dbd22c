//! Scrap Rebellion — the economy and combat core of a boss-battling
//! incremental game.
//!
//! The client simulates locally (taps, idle production, timed buffs)
//! while the server stays authoritative over currencies, inventory, and
//! progression. `session` drives the local loop, `sync` carries it to
//! the backend, and `server` is the reference backend the tests run
//! against.

pub mod api;
pub mod catalog;
pub mod combat;
pub mod effects;
pub mod error;
pub mod formulas;
pub mod idle;
pub mod server;
pub mod session;
pub mod state;
pub mod sync;
pub mod time;

pub use error::{ApiError, SyncError, TransportError};
pub use server::InMemoryServer;
pub use session::GameSession;
pub use state::ClientState;
pub use sync::{SyncClient, Transport};
