//! `bazaar-core`: identity building blocks shared by every layer.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProfileId, ResellerId, SupplierId, UserId};
