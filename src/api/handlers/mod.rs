//! HTTP endpoint handlers.

pub mod system;
pub mod webhook;
