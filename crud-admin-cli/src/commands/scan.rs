//! Entity scan command

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use crud_admin::config::CrudAdminConfig;
use crud_admin::discovery::{
    DiscoveryReport, EntityDiscoverer, EntitySource, InventorySource, ManifestFile,
};

/// Scan configured namespaces and list what was discovered
#[derive(Debug, Clone)]
pub struct ScanCommand {
    service: String,
    config: Option<PathBuf>,
    packages: Option<String>,
    manifest: Option<PathBuf>,
}

impl ScanCommand {
    /// Scan with the layered configuration of `service`
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            config: None,
            packages: None,
            manifest: None,
        }
    }

    /// Load configuration from this file instead
    #[must_use]
    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    /// Override `admin.base_packages`
    #[must_use]
    pub fn with_packages(mut self, packages: Option<String>) -> Self {
        self.packages = packages;
        self
    }

    /// Scan an entity manifest instead of the compiled-in registrations
    #[must_use]
    pub fn with_manifest(mut self, manifest: Option<PathBuf>) -> Self {
        self.manifest = manifest;
        self
    }

    /// Resolve the configuration this scan runs with
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn load_config(&self) -> Result<CrudAdminConfig> {
        let mut config = match &self.config {
            Some(path) => CrudAdminConfig::load_from(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => CrudAdminConfig::load_for_service(&self.service)
                .with_context(|| format!("Failed to load configuration for {}", self.service))?,
        };

        if let Some(packages) = &self.packages {
            config.admin.base_packages = Some(packages.clone());
        }
        Ok(config)
    }

    /// Run the scan without printing
    ///
    /// The `enabled` flag is not consulted: an explicit scan always runs.
    /// An unreadable manifest fails every scanned namespace in the report.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn run(&self) -> Result<DiscoveryReport> {
        let config = self.load_config()?;

        let source: Box<dyn EntitySource> = match &self.manifest {
            Some(path) => Box::new(ManifestFile::open(path)),
            None => Box::new(InventorySource::new()),
        };
        tracing::debug!(source = source.name(), "Scanning for entities");

        Ok(EntityDiscoverer::new(source).discover_configured(&config.admin))
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot run; namespace failures are
    /// printed, not returned.
    pub fn execute(&self) -> Result<()> {
        println!(
            "{} {}",
            style("Scanning").green().bold(),
            style("for entities...").bold()
        );
        println!();

        let report = self.run()?;

        for type_name in report.registry() {
            println!("  {} {}", style("✓").green(), style(type_name).cyan());
        }
        for failure in report.failures() {
            println!(
                "  {} {}: {}",
                style("✗").red(),
                style(&failure.namespace).yellow(),
                failure.error
            );
        }

        println!();
        println!(
            "{} {} entit{} discovered, {} namespace{} failed",
            style("Done:").green().bold(),
            report.registry().len(),
            if report.registry().len() == 1 { "y" } else { "ies" },
            report.failures().len(),
            if report.failures().len() == 1 { "" } else { "s" },
        );

        Ok(())
    }
}
