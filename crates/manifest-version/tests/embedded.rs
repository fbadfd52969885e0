use manifest_version::{EmbeddedLocator, ManifestVersionProvider, VersionProvider};

#[manifest_version::version_provider("Embedded Test App")]
struct TestAppVersion;

fn expected(title: &str) -> Vec<String> {
    vec![format!("{title} version {}", env!("CARGO_PKG_VERSION"))]
}

#[test]
fn finds_manifest_embedded_in_running_binary() {
    manifest_version::embed_manifest!("Embedded Test App");

    let locator = EmbeddedLocator::current_exe().unwrap();
    let provider = ManifestVersionProvider::new("Embedded Test App", locator).unwrap();

    assert_eq!(provider.version().unwrap(), expected("Embedded Test App"));
}

#[test]
fn default_title_is_package_name() {
    manifest_version::embed_manifest!();

    let locator = EmbeddedLocator::current_exe().unwrap();
    let provider = ManifestVersionProvider::new(env!("CARGO_PKG_NAME"), locator).unwrap();

    assert_eq!(provider.version().unwrap(), expected(env!("CARGO_PKG_NAME")));
}

#[test]
fn unknown_project_is_not_found_in_binary() {
    manifest_version::embed_manifest!("Embedded Test App");

    let provider = ManifestVersionProvider::new("abc", EmbeddedLocator::current_exe().unwrap())
        .unwrap();
    assert!(provider.version().unwrap().is_empty());
}

#[test]
fn declared_provider_resolves_from_running_binary() {
    manifest_version::embed_manifest!("Embedded Test App");

    assert_eq!(TestAppVersion::PROJECT, "Embedded Test App");
    assert_eq!(TestAppVersion.version().unwrap(), expected("Embedded Test App"));
}
