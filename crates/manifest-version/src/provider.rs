use anyhow::bail;
use tracing::{debug, error};

use crate::{
    embed::EmbeddedLocator,
    locator::{Chain, Location, ResourceLocator, SearchPath},
    manifest::{Manifest, IMPLEMENTATION_TITLE, IMPLEMENTATION_VERSION},
};

/// Relative path of the descriptor inside a packaged artifact.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Embedded descriptors of the running binary first, then a
/// `META-INF/MANIFEST.MF` next to it.
pub type DefaultLocator = Chain<EmbeddedLocator, SearchPath>;

/// Something a CLI can ask for its `--version` lines.
pub trait VersionProvider {
    fn version(&self) -> anyhow::Result<Vec<String>>;
}

/// Version provider backed by manifest descriptors. Only the descriptor
/// whose `Implementation-Title` equals the project is used, so it works when
/// several artifacts are visible on the same search path.
#[derive(Debug, Clone)]
pub struct ManifestVersionProvider<L> {
    project: String,
    locator: L,
}

impl ManifestVersionProvider<DefaultLocator> {
    pub fn current(project: impl Into<String>) -> anyhow::Result<Self> {
        let locator = Chain(EmbeddedLocator::current_exe()?, SearchPath::beside_exe()?);
        Self::new(project, locator)
    }
}

impl<L: ResourceLocator> ManifestVersionProvider<L> {
    pub fn new(project: impl Into<String>, locator: L) -> anyhow::Result<Self> {
        let project = project.into();
        if project.is_empty() {
            bail!("project title must not be empty");
        }
        Ok(Self { project, locator })
    }

    /// The title used to pick the right manifest.
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Zero or one version lines. Candidates are tried in locator order and
    /// the scan stops at the first manifest with a matching title.
    /// Unreadable candidates are logged and skipped; only a failing
    /// enumeration is an error.
    pub fn version(&self) -> anyhow::Result<Vec<String>> {
        debug!(project = %self.project, path = MANIFEST_PATH, "searching for version data");
        let candidates = self.locator.resources(MANIFEST_PATH)?;

        let mut version = None;
        for location in candidates {
            if let Some(manifest) = Self::load(&location) {
                if self.is_valid(&manifest) {
                    version = Some(compose(&manifest));
                    break;
                }
            }
        }

        match version {
            Some(version) => {
                debug!("found version data");
                debug!(version = %version, "version");
                Ok(vec![version])
            }
            None => {
                debug!(project = %self.project, "found no version data");
                Ok(vec![])
            }
        }
    }

    /// The single version line, if any.
    pub fn version_line(&self) -> anyhow::Result<Option<String>> {
        Ok(self.version()?.into_iter().next())
    }

    fn load(location: &L::Location) -> Option<Manifest> {
        debug!(%location, "reading manifest");

        let manifest = location
            .open()
            .map_err(anyhow::Error::from)
            .and_then(Manifest::read);
        match manifest {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                error!(%location, "unable to read manifest: {e:#}");
                None
            }
        }
    }

    fn is_valid(&self, manifest: &Manifest) -> bool {
        manifest
            .main_attributes()
            .get(IMPLEMENTATION_TITLE)
            .is_some_and(|title| title == self.project)
    }
}

impl<L: ResourceLocator> VersionProvider for ManifestVersionProvider<L> {
    fn version(&self) -> anyhow::Result<Vec<String>> {
        ManifestVersionProvider::version(self)
    }
}

// "<title> " followed by "version <version>" when present. The trailing
// space without a version is kept.
fn compose(manifest: &Manifest) -> String {
    let attributes = manifest.main_attributes();
    let mut version = String::new();

    version.push_str(attributes.get(IMPLEMENTATION_TITLE).unwrap_or_default());
    version.push(' ');

    if let Some(v) = attributes.get(IMPLEMENTATION_VERSION) {
        version.push_str("version ");
        version.push_str(v);
    }
    version
}
