//! Picking backup core library — domain types, normalisation, snapshot codec.
//!
//! - [`types`] — [`Status`], [`Record`], [`Snapshot`], [`CommitId`]
//! - [`normalize`] — total functions mapping raw client values to canonical form
//! - [`codec`] — deterministic snapshot encode / decode
//! - [`error`] — [`CodecError`]

pub mod codec;
pub mod error;
pub mod normalize;
pub mod types;

pub use error::CodecError;
pub use normalize::{normalize_date, normalize_status, normalize_timestamp};
pub use types::{CommitId, Record, Snapshot, Status};
