//! Data Transfer Objects for HTTP response serialization.

pub mod system_dto;
pub mod webhook_dto;

pub use system_dto::*;
pub use webhook_dto::*;
