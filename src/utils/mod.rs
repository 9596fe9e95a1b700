//! Utility functions

pub mod crypto;
pub mod encode;

pub use encode::{ParamValue, Params};
