//! Protocol message model, frame builders, filtering, and validation.

pub mod builder;
pub mod filter;
pub mod types;
pub mod validator;

pub use filter::{Criterion, DefaultMessageFilter, MessageFilter, TransformRule};
pub use types::Message;
