use std::{
    env,
    ffi::OsStr,
    fmt::{self, Display},
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use anyhow::Context;

/// A resource found by a [`ResourceLocator`]. Opening it may fail; the
/// location itself stays valid for logging either way.
pub trait Location: Display {
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// Enumerates every resource visible at a relative path, in search order.
///
/// An `Err` means the enumeration itself could not run. Candidates that turn
/// out to be unreadable are reported later, through [`Location::open`].
pub trait ResourceLocator {
    type Location: Location;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = Self::Location> + '_>;
}

impl<L: ResourceLocator + ?Sized> ResourceLocator for &L {
    type Location = L::Location;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = Self::Location> + '_> {
        (**self).resources(path)
    }
}

/// `None` yields no candidates.
impl<L: ResourceLocator> ResourceLocator for Option<L> {
    type Location = L::Location;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = Self::Location> + '_> {
        let found = match self {
            Some(locator) => Some(locator.resources(path)?),
            None => None,
        };
        Ok(found.into_iter().flatten())
    }
}

/// Ordered list of directories searched for resources on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots.extend(roots.into_iter().map(Into::into));
        self
    }

    /// Roots taken from a platform path list (`:` or `;` separated) in the
    /// environment variable `var`. An unset variable gives no roots.
    pub fn from_env(var: impl AsRef<OsStr>) -> Self {
        match env::var_os(var) {
            Some(list) => Self::new().roots(env::split_paths(&list)),
            None => Self::new(),
        }
    }

    /// The directory holding the running executable.
    pub fn beside_exe() -> anyhow::Result<Self> {
        let exe = env::current_exe().context("failed to locate the running executable")?;
        let dir = exe
            .parent()
            .ok_or_else(|| anyhow::anyhow!("executable {} has no parent directory", exe.display()))?;
        Ok(Self::new().root(dir))
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ResourceLocator for SearchPath {
    type Location = FileResource;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = FileResource> + '_> {
        let relative = path.to_string();
        Ok(self
            .roots
            .iter()
            .map(move |root| root.join(&relative))
            .filter(|candidate| candidate.exists())
            .map(FileResource))
    }
}

/// A resource file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResource(PathBuf);

impl FileResource {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Display for FileResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.0.display())
    }
}

impl Location for FileResource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.0)?)))
    }
}

/// Yields every candidate of the first locator, then every candidate of the second.
#[derive(Debug, Clone, Default)]
pub struct Chain<A, B>(pub A, pub B);

impl<A: ResourceLocator, B: ResourceLocator> ResourceLocator for Chain<A, B> {
    type Location = Link<A::Location, B::Location>;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = Self::Location> + '_> {
        let first = self.0.resources(path)?.map(Link::First);
        let second = self.1.resources(path)?.map(Link::Second);
        Ok(first.chain(second))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link<A, B> {
    First(A),
    Second(B),
}

impl<A: Display, B: Display> Display for Link<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::First(l) => l.fmt(f),
            Link::Second(l) => l.fmt(f),
        }
    }
}

impl<A: Location, B: Location> Location for Link<A, B> {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            Link::First(l) => l.open(),
            Link::Second(l) => l.open(),
        }
    }
}
