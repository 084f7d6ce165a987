//! Defines methods that can be shared by the binaries

/// Methods for reading arguments
pub mod args;
