//! The background process: sole owner of rule storage and the redirect engine.
//!
//! Requests arrive over the bridge, are dispatched by [`Handler`], and every
//! mutation ends with a full engine rebuild inside `RuleService`.

pub mod badge;
pub mod handler;

pub use badge::{Badge, BadgeIndicator};
pub use handler::Handler;
