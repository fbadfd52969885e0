use std::{
    env,
    fmt::{self, Display},
    io::{self, Cursor, Read},
    ops::Range,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{bail, Context};
use tracing::debug;

use crate::locator::{Location, ResourceLocator};

// 25 bytes
#[doc(hidden)]
pub const REGION_START: &[u8] = b"\x17\x42MANIFEST\x42VERSION\x42START\x17";
// 23 bytes
#[doc(hidden)]
pub const REGION_END: &[u8] = b"\x17\x42MANIFEST\x42VERSION\x42END\x17";

const _: () = {
    assert!(REGION_START.len() == 25);
    assert!(REGION_END.len() == 23);
};

/// Builds one embedded region:
/// `START | path len (u16 le) | path | body len (u32 le) | body | END`.
///
/// `embed_manifest!` emits the same layout at compile time.
pub fn encode_region(path: &str, body: &[u8]) -> anyhow::Result<Vec<u8>> {
    let Ok(path_len) = u16::try_from(path.len()) else {
        bail!("region path too long: {} bytes", path.len());
    };
    let Ok(body_len) = u32::try_from(body.len()) else {
        bail!("region body too long: {} bytes", body.len());
    };

    let mut buf =
        Vec::with_capacity(REGION_START.len() + 2 + path.len() + 4 + body.len() + REGION_END.len());
    buf.extend_from_slice(REGION_START);
    buf.extend_from_slice(&path_len.to_le_bytes());
    buf.extend_from_slice(path.as_bytes());
    buf.extend_from_slice(&body_len.to_le_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(REGION_END);
    Ok(buf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    offset: usize,
    path: String,
    body: Range<usize>,
    end: usize,
}

/// Every well-formed region in `image`, in image order. Marker hits that do
/// not decode (the marker constants themselves, stray bytes) are skipped.
fn regions(image: &[u8]) -> Vec<Region> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(hit) = find(&image[offset..], REGION_START) {
        let at = offset + hit;
        match decode_at(image, at) {
            Some(region) => {
                offset = region.end;
                found.push(region);
            }
            None => offset = at + 1,
        }
    }
    found
}

fn decode_at(image: &[u8], offset: usize) -> Option<Region> {
    let mut pos = offset + REGION_START.len();

    let path_len = u16::from_le_bytes(image.get(pos..pos + 2)?.try_into().ok()?) as usize;
    pos += 2;
    let path = std::str::from_utf8(image.get(pos..pos + path_len)?).ok()?;
    pos += path_len;

    let body_len = u32::from_le_bytes(image.get(pos..pos + 4)?.try_into().ok()?) as usize;
    pos += 4;
    let body = pos..pos.checked_add(body_len)?;
    image.get(body.clone())?;
    pos = body.end;

    if image.get(pos..pos + REGION_END.len())? != REGION_END {
        return None;
    }

    Some(Region {
        offset,
        path: path.to_string(),
        body,
        end: pos + REGION_END.len(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Image { name: String, bytes: Arc<[u8]> },
}

/// Finds descriptors embedded in an executable image, usually the running
/// binary. Reading the image happens on every enumeration.
#[derive(Debug, Clone)]
pub struct EmbeddedLocator {
    source: Source,
}

impl EmbeddedLocator {
    pub fn current_exe() -> anyhow::Result<Self> {
        let exe = env::current_exe().context("failed to locate the running executable")?;
        Ok(Self::from_path(exe))
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            source: Source::Image {
                name: name.into(),
                bytes: bytes.into(),
            },
        }
    }

    fn image(&self) -> anyhow::Result<(String, Arc<[u8]>)> {
        match &self.source {
            Source::File(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read image {}", path.display()))?;
                Ok((path.display().to_string(), bytes.into()))
            }
            Source::Image { name, bytes } => Ok((name.clone(), bytes.clone())),
        }
    }
}

impl ResourceLocator for EmbeddedLocator {
    type Location = EmbeddedResource;

    fn resources(&self, path: &str) -> anyhow::Result<impl Iterator<Item = EmbeddedResource> + '_> {
        let (origin, image) = self.image()?;
        let found = regions(&image)
            .into_iter()
            .filter(|region| region.path == path)
            .map(|region| EmbeddedResource {
                origin: origin.clone(),
                offset: region.offset,
                image: image.clone(),
                body: region.body,
            })
            .collect::<Vec<_>>();

        debug!(origin = %origin, path, regions = found.len(), "scanned image for embedded resources");
        Ok(found.into_iter())
    }
}

/// One embedded region, sharing the image it was found in.
#[derive(Debug, Clone)]
pub struct EmbeddedResource {
    origin: String,
    offset: usize,
    image: Arc<[u8]>,
    body: Range<usize>,
}

impl EmbeddedResource {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn bytes(&self) -> &[u8] {
        &self.image[self.body.clone()]
    }
}

impl Display for EmbeddedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "embedded:{}@{:#x}", self.origin, self.offset)
    }
}

impl Location for EmbeddedResource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.bytes())))
    }
}
