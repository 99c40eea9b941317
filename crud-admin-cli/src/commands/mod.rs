//! CLI command implementations

pub mod describe;
pub mod scan;

pub use describe::DescribeCommand;
pub use scan::ScanCommand;
