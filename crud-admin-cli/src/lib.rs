//! crud-admin CLI library
//!
//! The commands behind the `crud-admin` binary, usable from tests and from
//! applications that want to embed the same inspection output.

#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

pub mod commands;

pub use commands::{DescribeCommand, ScanCommand};
