//! Connection hub for Kaboo.
//!
//! The hub tracks one live connection per logged-in user and delivers
//! notifications to any subset of users without blocking the caller:
//!
//! 1. **Authentication**: resolving a bearer token to an identity
//!    ([`Authenticator`] trait)
//! 2. **Connection tracking**: one live endpoint per user, owned by a
//!    single coordination task ([`Hub`], [`HubHandle`])
//! 3. **Fan-out**: serialize once, enqueue on every target connection's
//!    outbound queue ([`HubHandle::broadcast`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby Layer (above)  ← asks the hub to notify the players of a game
//!     ↕
//! Hub Layer (this crate)  ← owns live connections and their I/O tasks
//!     ↕
//! Transport Layer (below)  ← frames, pings, close
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod client;
mod config;
mod error;
mod hub;

pub use auth::{Authenticator, DevAuthenticator};
pub use client::InboundMessage;
pub use config::HubConfig;
pub use error::{AuthError, HubError};
pub use hub::{Hub, HubHandle, Inbox};
