//! Utility functions and types.
//!
//! This module provides the collaborators the handle types rely on:
//! network byte order conversion, C string arguments and log level
//! handling.

pub mod byteorder;
pub mod cstring;
pub mod logging;

pub use byteorder::NetworkOrder;
pub use cstring::{with_c_path, with_c_str};
pub use logging::LogLevel;
