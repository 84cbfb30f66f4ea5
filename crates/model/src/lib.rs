//! Provider-neutral protocol between the agent loop and chat models.
//!
//! A provider takes the whole conversation plus the tool declarations and
//! streams back one assistant turn as a sequence of events: text
//! fragments, tool call requests, and a final finish reason. Types in this
//! crate don't define any behavior, they are the constraints provider
//! implementations adhere to.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
