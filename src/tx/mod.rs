//! Transaction Module
//!
//! Message layouts, transfer payloads, per-version signing and the sender
//! that submits signed requests.

mod builder;
mod envelope;
mod message;
mod payload;
mod sender;

pub use builder::*;
pub use envelope::*;
pub use message::*;
pub use payload::*;
pub use sender::*;
