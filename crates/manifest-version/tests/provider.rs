use std::{
    cell::Cell,
    fmt,
    io::{self, Read},
    rc::Rc,
};

use manifest_version::{
    Location, ManifestVersionProvider, ResourceLocator, VersionProvider, MANIFEST_PATH,
};

const FULL: &str = "Manifest-Version: 1.0\n\
    Implementation-Title: Test App Impl\n\
    Implementation-Version: 1.0.0\n";

const OTHER: &str = "Manifest-Version: 1.0\n\
    Implementation-Title: Some Library\n\
    Implementation-Version: 9.9.9\n";

const NO_VERSION: &str = "Manifest-Version: 1.0\n\
    Implementation-Title: Test App Impl\n";

const NO_TITLE: &str = "Manifest-Version: 1.0\n\
    Implementation-Version: 1.0.0\n";

struct StubResource {
    index: usize,
    content: Option<&'static str>,
    opens: Rc<Cell<usize>>,
}

impl fmt::Display for StubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stub:{}", self.index)
    }
}

impl Location for StubResource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        self.opens.set(self.opens.get() + 1);
        match self.content {
            Some(content) => Ok(Box::new(content.as_bytes())),
            None => Err(io::Error::new(io::ErrorKind::PermissionDenied, "stub is unreadable")),
        }
    }
}

/// `None` entries fail to open.
#[derive(Default)]
struct StubLocator {
    resources: Vec<Option<&'static str>>,
    fail: bool,
    opens: Rc<Cell<usize>>,
}

impl StubLocator {
    fn new(resources: Vec<Option<&'static str>>) -> Self {
        Self {
            resources,
            ..Default::default()
        }
    }

    fn opens(&self) -> usize {
        self.opens.get()
    }
}

impl ResourceLocator for StubLocator {
    type Location = StubResource;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = StubResource> + '_> {
        if self.fail {
            anyhow::bail!("resource lookup unavailable");
        }
        assert_eq!(path, MANIFEST_PATH);
        Ok(self
            .resources
            .iter()
            .enumerate()
            .map(|(index, content)| StubResource {
                index,
                content: *content,
                opens: self.opens.clone(),
            }))
    }
}

#[test]
fn returns_title_and_version() {
    let provider =
        ManifestVersionProvider::new("Test App Impl", StubLocator::new(vec![Some(FULL)])).unwrap();

    let version = provider.version().unwrap();
    assert_eq!(version.len(), 1);
    assert_eq!(version[0], "Test App Impl version 1.0.0");
}

#[test]
fn no_descriptor_gives_no_version() {
    let provider = ManifestVersionProvider::new("abc", StubLocator::new(vec![])).unwrap();
    assert!(provider.version().unwrap().is_empty());
}

#[test]
fn title_mismatch_gives_no_version() {
    let locator = StubLocator::new(vec![Some(OTHER), Some(FULL), Some(NO_TITLE)]);
    let provider = ManifestVersionProvider::new("abc", &locator).unwrap();

    assert!(provider.version().unwrap().is_empty());
    assert_eq!(locator.opens(), 3);
}

#[test]
fn title_compare_is_case_sensitive() {
    let provider =
        ManifestVersionProvider::new("test app impl", StubLocator::new(vec![Some(FULL)])).unwrap();
    assert!(provider.version().unwrap().is_empty());
}

#[test]
fn attribute_names_are_case_insensitive() {
    let content = "implementation-title: Test App Impl\nIMPLEMENTATION-VERSION: 2.0\n";
    let provider =
        ManifestVersionProvider::new("Test App Impl", StubLocator::new(vec![Some(content)]))
            .unwrap();
    assert_eq!(provider.version().unwrap(), vec!["Test App Impl version 2.0"]);
}

#[test]
fn missing_version_keeps_trailing_space() {
    let provider =
        ManifestVersionProvider::new("Test App Impl", StubLocator::new(vec![Some(NO_VERSION)]))
            .unwrap();
    assert_eq!(provider.version().unwrap(), vec!["Test App Impl "]);
}

#[test]
fn skips_other_artifacts_until_match() {
    let provider = ManifestVersionProvider::new(
        "Test App Impl",
        StubLocator::new(vec![Some(OTHER), Some(NO_TITLE), Some(FULL)]),
    )
    .unwrap();
    assert_eq!(provider.version().unwrap(), vec!["Test App Impl version 1.0.0"]);
}

#[test]
fn first_match_wins_and_stops_scanning() {
    let locator = StubLocator::new(vec![Some(NO_VERSION), Some(FULL)]);
    let provider = ManifestVersionProvider::new("Test App Impl", &locator).unwrap();

    assert_eq!(provider.version().unwrap(), vec!["Test App Impl "]);
    assert_eq!(locator.opens(), 1);
}

#[test]
fn unreadable_candidate_is_skipped() {
    let locator = StubLocator::new(vec![None, Some(FULL)]);
    let provider = ManifestVersionProvider::new("Test App Impl", &locator).unwrap();

    assert_eq!(provider.version().unwrap(), vec!["Test App Impl version 1.0.0"]);
    assert_eq!(locator.opens(), 2);
}

#[test]
fn malformed_candidate_is_skipped() {
    let provider = ManifestVersionProvider::new(
        "Test App Impl",
        StubLocator::new(vec![Some("this is not a manifest\n"), Some(FULL)]),
    )
    .unwrap();
    assert_eq!(provider.version().unwrap(), vec!["Test App Impl version 1.0.0"]);
}

#[test]
fn enumeration_failure_is_an_error() {
    let locator = StubLocator {
        fail: true,
        ..StubLocator::new(vec![Some(FULL)])
    };
    let provider = ManifestVersionProvider::new("Test App Impl", &locator).unwrap();

    let err = provider.version().unwrap_err();
    assert!(err.to_string().contains("unavailable"));
    assert_eq!(locator.opens(), 0);
}

#[test]
fn repeated_calls_agree() {
    let provider = ManifestVersionProvider::new(
        "Test App Impl",
        StubLocator::new(vec![None, Some(OTHER), Some(FULL)]),
    )
    .unwrap();

    let first = provider.version().unwrap();
    let second = provider.version().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, vec!["Test App Impl version 1.0.0"]);
}

#[test]
fn empty_project_is_rejected() {
    assert!(ManifestVersionProvider::new("", StubLocator::new(vec![])).is_err());
}

#[test]
fn exposes_project_and_single_line() {
    let provider =
        ManifestVersionProvider::new("Test App Impl", StubLocator::new(vec![Some(FULL)])).unwrap();
    assert_eq!(provider.project(), "Test App Impl");
    assert_eq!(
        provider.version_line().unwrap().as_deref(),
        Some("Test App Impl version 1.0.0")
    );

    assert_eq!(provider.locator().opens(), 1);

    let dynamic: &dyn VersionProvider = &provider;
    assert_eq!(dynamic.version().unwrap().len(), 1);
}
