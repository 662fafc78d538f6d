//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, never on each other in reverse.
//!
//! ## Delivery Model
//! - A document is any `Serialize` value; the dispatcher never inspects it
//! - A `Payload` is the serialized wire form handed to a `Transport`
//! - Every delivery attempt produces exactly one `DeliveryReport`

mod config;
mod document;
mod error;
mod payload;
mod report;
mod transport;

pub use config::*;
pub use document::*;
pub use error::*;
pub use payload::{Payload, JSON_CONTENT_TYPE};
pub use report::*;
pub use transport::*;
