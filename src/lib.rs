//! Evostrat
//!
//! Evostrat is a library and an executable to run evolution strategies against
//! benchmark functions.
#![warn(missing_docs, unused)]

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate clap;

/// Tools for binaries
pub mod bin_utils;
/// Benchmark objectives
pub mod objectives;
