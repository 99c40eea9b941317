//! crud-admin CLI tool

#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crud_admin::observability::{self, ObservabilityConfig};
use crud_admin_cli::{DescribeCommand, ScanCommand};

#[derive(Parser)]
#[command(name = "crud-admin")]
#[command(version)]
#[command(about = "Inspect entity discovery and metamodels for crud-admin", long_about = None)]
struct Cli {
    /// Log at debug level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the configured namespaces and list discovered entities
    Scan {
        /// Configuration file (default: layered service configuration)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated namespaces, overriding `admin.base_packages`
        #[arg(short, long)]
        packages: Option<String>,

        /// Entity manifest to scan instead of the compiled-in registrations
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Service name used to locate configuration files
        #[arg(long, default_value = "crud-admin")]
        service: String,
    },
    /// Print the metamodel of one entity type
    Describe {
        /// Fully qualified type name, or its last segment when unambiguous
        type_name: String,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    observability::init_with(
        &ObservabilityConfig::new("crud-admin")
            .with_json(false)
            .with_verbose(cli.verbose),
    )?;

    match cli.command {
        Commands::Scan {
            config,
            packages,
            manifest,
            service,
        } => {
            let cmd = ScanCommand::new(service)
                .with_config(config)
                .with_packages(packages)
                .with_manifest(manifest);
            cmd.execute()?;
        }
        Commands::Describe { type_name, json } => {
            let cmd = DescribeCommand::new(type_name, json);
            cmd.execute()?;
        }
    }

    Ok(())
}
