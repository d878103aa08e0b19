//! On-disk JSON files shared by the ingestion and reporting pipelines.
//!
//! Every file is a single JSON object with keys sorted at all levels and one entry per line, so
//! successive snapshots diff cleanly. Files are replaced atomically: the new content goes to a
//! temporary file next to the target, which is then renamed over it.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::Context;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;

use crate::preprint::Preprint;

/// Every known preprint, keyed by identifier.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Preprint>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, returning the one it replaced if the identifier was already present.
    pub fn insert(&mut self, preprint: Preprint) -> Option<Preprint> {
        self.0.insert(preprint.id.clone(), preprint)
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&Preprint> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &Preprint> {
        self.0.values()
    }

    /// Lightweight identifier → DOI companion of the snapshot.
    pub fn doi_index(&self) -> DoiIndex {
        DoiIndex(
            self.0
                .iter()
                .map(|(id, p)| (id.clone(), p.doi.clone()))
                .collect(),
        )
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }
}

impl FromIterator<Preprint> for Snapshot {
    fn from_iter<T: IntoIterator<Item = Preprint>>(iter: T) -> Self {
        let mut snapshot = Snapshot::new();
        for p in iter {
            snapshot.insert(p);
        }
        snapshot
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoiIndex(BTreeMap<String, Option<String>>);

impl DoiIndex {
    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).and_then(|d| d.as_deref())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }
}

/// Published DOI → journal name. Entries are only ever added.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalCache(BTreeMap<String, String>);

impl JournalCache {
    /// Load the cache, starting empty when the file does not exist yet.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("no journal cache at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }

    pub fn contains(&self, doi: &str) -> bool {
        self.0.contains_key(doi)
    }

    #[cfg(test)]
    pub fn get(&self, doi: &str) -> Option<&str> {
        self.0.get(doi).map(String::as_str)
    }

    /// Record a lookup result unless `doi` is already known. Returns whether it was added.
    pub fn insert_new(&mut self, doi: &str, journal: String) -> bool {
        if self.0.contains_key(doi) {
            return false;
        }
        self.0.insert(doi.to_string(), journal);
        true
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn journals(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for JournalCache {
    fn from(entries: [(&str, &str); N]) -> Self {
        JournalCache(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Serialize `value` to `path` with sorted keys, replacing any existing file atomically.
///
/// A `.gz` extension selects gzip compression.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    // Going through `Value` sorts keys at every level, not just the top one.
    let value = serde_json::to_value(value).context("failed to serialise JSON")?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot create temporary file in {}", dir.display()))?;

    {
        let file = BufWriter::new(tmp.as_file_mut());
        if is_gzip(path) {
            let mut gz = GzEncoder::new(file, Compression::default());
            write_sorted(&mut gz, &value)?;
            gz.finish()?.flush()?;
        } else {
            let mut file = file;
            write_sorted(&mut file, &value)?;
            file.flush()?;
        }
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("cannot replace {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn write_sorted<W: Write>(writer: &mut W, value: &serde_json::Value) -> anyhow::Result<()> {
    let mut ser =
        serde_json::Serializer::with_formatter(&mut *writer, PrettyFormatter::with_indent(b""));
    value.serialize(&mut ser)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Read a JSON file written by [`write_json`], decompressing `.gz` files.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    serde_json::from_reader(BufReader::new(reader))
        .with_context(|| format!("cannot parse {}", path.display()))
}
