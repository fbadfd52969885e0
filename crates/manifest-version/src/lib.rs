//! Version lines for command line tools, read from the `META-INF/MANIFEST.MF`
//! descriptor packaged with the application.
//!
//! ```no_run
//! use manifest_version::{ManifestVersionProvider, SearchPath};
//!
//! let provider = ManifestVersionProvider::new("My App", SearchPath::new().root("dist"))?;
//! for line in provider.version()? {
//!     println!("{line}");
//! }
//! # Ok::<(), manifest_version::Error>(())
//! ```
pub mod embed;
pub mod locator;
pub mod manifest;
mod provider;

pub use anyhow::{Error, Result};

pub use embed::{EmbeddedLocator, EmbeddedResource};
pub use locator::{Chain, FileResource, Location, ResourceLocator, SearchPath};
pub use manifest::{Attributes, Manifest};
pub use provider::{DefaultLocator, ManifestVersionProvider, VersionProvider, MANIFEST_PATH};

pub use manifest_version_macros::*;
