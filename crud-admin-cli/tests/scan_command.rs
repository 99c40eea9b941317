//! Scan command against manifest files

use std::io::Write;

use crud_admin::discovery::DiscoveryError;
use crud_admin_cli::ScanCommand;
use tempfile::NamedTempFile;

fn write(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_scan_manifest_with_package_override() {
    let manifest = write(
        r#"
        [[entity]]
        type_name = "shop::model::Order"
        marker = "entity"

        [[entity]]
        type_name = "shop::model::Auditable"
        marker = "mapped_superclass"

        [[entity]]
        type_name = "shop::model::OrderView"
        "#,
    );
    let config = write("[admin]\nenabled = false\n");

    let report = ScanCommand::new("crud-admin-test")
        .with_config(Some(config.path().to_path_buf()))
        .with_packages(Some("shop::model, warehouse".to_string()))
        .with_manifest(Some(manifest.path().to_path_buf()))
        .run()
        .unwrap();

    let names: Vec<&str> = report.registry().iter().collect();
    assert_eq!(names, vec!["shop::model::Order", "shop::model::Auditable"]);
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].namespace, "warehouse");
}

#[test]
fn test_scan_uses_configured_packages() {
    let manifest = write("[[entity]]\ntype_name = \"billing::Invoice\"\nmarker = \"entity\"\n");
    let config = write("[admin]\nbase_packages = \"billing\"\n");

    let command = ScanCommand::new("crud-admin-test")
        .with_config(Some(config.path().to_path_buf()))
        .with_manifest(Some(manifest.path().to_path_buf()));

    assert_eq!(
        command.load_config().unwrap().admin.base_packages.as_deref(),
        Some("billing")
    );
    assert!(command.run().unwrap().registry().contains("billing::Invoice"));
}

#[test]
fn test_scan_missing_manifest_fails_each_namespace() {
    let config = write("[admin]\n");
    let report = ScanCommand::new("crud-admin-test")
        .with_config(Some(config.path().to_path_buf()))
        .with_packages(Some("shop, billing".to_string()))
        .with_manifest(Some("/nonexistent/entities.toml".into()))
        .run()
        .unwrap();

    assert!(report.registry().is_empty());
    assert_eq!(report.failures().len(), 2);
    assert!(report
        .failures()
        .iter()
        .all(|failure| matches!(failure.error, DiscoveryError::Io { .. })));
}

#[test]
fn test_scan_malformed_manifest_is_reported() {
    let manifest = write("[[entity]]\nmarker = 3\n");
    let config = write("[admin]\n");
    let report = ScanCommand::new("crud-admin-test")
        .with_config(Some(config.path().to_path_buf()))
        .with_packages(Some("shop".to_string()))
        .with_manifest(Some(manifest.path().to_path_buf()))
        .run()
        .unwrap();

    assert_eq!(report.failures()[0].namespace, "shop");
    assert!(matches!(
        report.failures()[0].error,
        DiscoveryError::Manifest { .. }
    ));
}
