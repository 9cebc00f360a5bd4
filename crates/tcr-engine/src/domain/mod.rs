//! Domain vocabulary shared across the engine: message and status value
//! types plus the error taxonomy.

pub mod error;
pub mod message;
pub mod status;

pub use error::{Result, TcrError};
pub use message::{Message, MessageKind};
pub use status::{Status, StatusRegistry};
