//! Redirect rule management.
//!
//! This crate provides:
//! - [`RuleStore`]: persisted rule list, id counter and global enabled flag
//! - [`dnr`]: translation of stored rules into declarative redirect rules
//! - [`engine`]: the declarative engine interface and an in-process implementation
//! - [`RuleService`]: serialized mutations with a full engine rebuild after each
//! - [`convert`]: native and third-party import/export formats

pub mod convert;
pub mod dnr;
pub mod engine;
pub mod error;
pub mod service;
pub mod store;

pub use dnr::{to_dnr_rule, DnrRule};
pub use engine::{DeclarativeEngine, EngineError, InMemoryEngine, Redirect, RuleSetUpdate};
pub use error::{Result, RuleError};
pub use service::RuleService;
pub use store::RuleStore;
