//! # Kaboo
//!
//! Lobby server for the Kaboo card game. Authenticated users create and
//! join games over REST; everyone in a game hears about new players over a
//! long-lived WebSocket connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kaboo::prelude::*;
//!
//! # async fn start() -> Result<(), KabooError> {
//! let server = KabooServerBuilder::new()
//!     .config(ServerConfig::from_env()?)
//!     .build(MemoryStore::new(), DevAuthenticator)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod rest;
mod server;

pub use config::ServerConfig;
pub use error::KabooError;
pub use server::{KabooServer, KabooServerBuilder, PROTOCOL_VERSION};

/// Everything needed to start a server or talk to one in tests.
pub mod prelude {
    pub use crate::{
        KabooError, KabooServer, KabooServerBuilder, PROTOCOL_VERSION,
        ServerConfig,
    };
    pub use kaboo_hub::{AuthError, Authenticator, DevAuthenticator, HubConfig};
    pub use kaboo_lobby::{
        GameSnapshot, GameState, GameStore, MemoryStore, StoreError, User,
    };
    pub use kaboo_protocol::{
        ExternalId, GameId, ServerEvent, SystemMessage, UserId, UserSummary,
    };
}
