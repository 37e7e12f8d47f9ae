//! Signing authority client: request construction and submission.

mod client;
mod request;

pub use client::*;
pub use request::*;
