use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    io::{self, Read, Write},
    str::FromStr,
};

use anyhow::{bail, Context};
use serde::{ser::SerializeMap, Serialize, Serializer};

pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const IMPLEMENTATION_TITLE: &str = "Implementation-Title";
pub const IMPLEMENTATION_VERSION: &str = "Implementation-Version";

const ENTRY_NAME: &str = "Name";
const MAX_NAME_LEN: usize = 70;
// bytes per physical line, excluding the line break
const LINE_WIDTH: usize = 72;

/// Attribute name. Compared ASCII case-insensitively, so
/// `implementation-title` finds `Implementation-Title`.
#[derive(Debug, Clone, Eq)]
pub struct Name(String);

impl Name {
    pub fn new(name: &str) -> anyhow::Result<Self> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            bail!("invalid attribute name length: {name:?}");
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            bail!("invalid attribute name: {name:?}");
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One section of a manifest, in the order the attributes were read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(Name, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.matches(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts or overwrites in place, returning the previous value.
    pub fn insert(&mut self, name: Name, value: impl Into<String>) -> Option<String> {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, old)) => Some(std::mem::replace(old, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write_to(&self, out: &mut impl Write, skip: Option<&str>) -> io::Result<()> {
        for (name, value) in &self.entries {
            if skip.is_some_and(|s| name.matches(s)) {
                continue;
            }
            write_header(out, name.as_str(), value)?;
        }
        Ok(())
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name.as_str(), value)?;
        }
        map.end()
    }
}

/// A JAR-style manifest: a main section followed by named per-entry sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    main: Attributes,
    entries: BTreeMap<String, Attributes>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a whole manifest from `reader`. I/O errors and malformed headers
    /// are reported as errors; invalid UTF-8 is replaced with U+FFFD.
    pub fn read(mut reader: impl Read) -> anyhow::Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        String::from_utf8_lossy(&buf).parse()
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    pub fn entry(&self, name: &str) -> Option<&Attributes> {
        self.entries.get(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert_entry(&mut self, name: impl Into<String>, attributes: Attributes) {
        self.entries.insert(name.into(), attributes);
    }

    /// Writes the manifest with CRLF line breaks, wrapping lines at 72 bytes.
    /// `Manifest-Version` always comes first in the main section.
    pub fn write(&self, mut out: impl Write) -> io::Result<()> {
        if let Some(version) = self.main.get(MANIFEST_VERSION) {
            write_header(&mut out, MANIFEST_VERSION, version)?;
        }
        self.main.write_to(&mut out, Some(MANIFEST_VERSION))?;
        out.write_all(b"\r\n")?;

        for (name, attributes) in &self.entries {
            write_header(&mut out, ENTRY_NAME, name)?;
            attributes.write_to(&mut out, Some(ENTRY_NAME))?;
            out.write_all(b"\r\n")?;
        }
        out.flush()
    }
}

impl Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.write(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl FromStr for Manifest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut manifest = Manifest::new();
        let mut sections = sections(s).into_iter();

        if let Some(main) = sections.next() {
            for (name, value) in parse_headers(&main)? {
                manifest.main.insert(name, value);
            }
        }

        for section in sections {
            let mut headers = parse_headers(&section)?.into_iter();
            let entry = match headers.next() {
                Some((name, value)) if name.matches(ENTRY_NAME) => value,
                _ => bail!(
                    "invalid manifest format (line {}): entry section must start with {ENTRY_NAME}",
                    section.first().map_or(0, |(n, _)| *n)
                ),
            };
            let attributes = manifest.entries.entry(entry).or_default();
            for (name, value) in headers {
                attributes.insert(name, value);
            }
        }

        Ok(manifest)
    }
}

/// Splits the text into blank-line separated sections of numbered lines.
/// The first section is the main section even when it is empty.
fn sections(text: &str) -> Vec<Vec<(usize, &str)>> {
    let mut out = vec![Vec::new()];
    for (idx, line) in lines(text).enumerate() {
        if line.is_empty() {
            if out.last().is_some_and(|s| !s.is_empty()) || out.len() == 1 {
                out.push(Vec::new());
            }
            continue;
        }
        if let Some(current) = out.last_mut() {
            current.push((idx + 1, line));
        }
    }
    while out.len() > 1 && out.last().is_some_and(|s| s.is_empty()) {
        out.pop();
    }
    out
}

fn parse_headers(section: &[(usize, &str)]) -> anyhow::Result<Vec<(Name, String)>> {
    let mut headers: Vec<(Name, String)> = Vec::new();
    for &(number, line) in section {
        if let Some(rest) = line.strip_prefix(' ') {
            match headers.last_mut() {
                Some((_, value)) => value.push_str(rest),
                None => bail!("continuation line without header (line {number})"),
            }
            continue;
        }

        let Some((name, value)) = line.split_once(": ") else {
            bail!("invalid header field (line {number})");
        };
        let name = Name::new(name).with_context(|| format!("invalid header field (line {number})"))?;
        headers.push((name, value.to_string()));
    }
    Ok(headers)
}

/// Physical lines, accepting `\n`, `\r\n` and `\r` terminators.
///
/// A last line without terminator is kept, unlike `java.util.jar.Manifest`
/// which rejects the whole manifest.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(|c: char| c == '\r' || c == '\n').unwrap_or(rest.len());
        let (line, tail) = rest.split_at(end);
        rest = if let Some(t) = tail.strip_prefix("\r\n") {
            t
        } else if tail.is_empty() {
            tail
        } else {
            &tail[1..]
        };
        Some(line)
    })
}

fn write_header(out: &mut impl Write, name: &str, value: &str) -> io::Result<()> {
    let line = format!("{name}: {value}");
    let mut rest = line.as_str();
    let mut width = LINE_WIDTH;
    loop {
        if rest.len() <= width {
            out.write_all(rest.as_bytes())?;
            return out.write_all(b"\r\n");
        }
        let mut cut = width;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.write_all(rest[..cut].as_bytes())?;
        out.write_all(b"\r\n ")?;
        rest = &rest[cut..];
        // continuation lines spend one byte on the leading space
        width = LINE_WIDTH - 1;
    }
}
