//! Wire protocol for Kaboo.
//!
//! This crate defines what travels over the realtime channel and the REST
//! surface:
//!
//! - **Types** ([`ServerEvent`], [`SystemMessage`], [`UserId`], [`GameId`]):
//!   the message structures that get serialized.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about connections or games; it only
//! knows how to name things and how to (de)serialize them.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ExternalId, GameId, ServerEvent, SystemMessage, UserId, UserSummary,
};
