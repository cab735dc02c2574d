//! CLI command implementations.

pub mod decode;
pub mod delete;
pub mod keygen;
pub mod show;
