//! Shared JSON fixtures for rigkit tests.
//!
//! Fixtures live under `fixtures/` at the workspace root and are listed in
//! `fixtures/manifest.json`. This crate only locates and parses them; each
//! consumer deserializes into its own types.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    timelines: HashMap<String, String>,
    documents: HashMap<String, DocumentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        frames: Vec<u32>,
    },
}

impl DocumentEntry {
    fn as_path(&self) -> &str {
        match self {
            DocumentEntry::Path(path) => path,
            DocumentEntry::Detailed { path, .. } => path,
        }
    }

    fn frames(&self) -> &[u32] {
        match self {
            DocumentEntry::Path(_) => &[],
            DocumentEntry::Detailed { frames, .. } => frames,
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Standalone keyed attributes and object timelines.
pub mod timelines {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<_> = MANIFEST.timelines.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.timelines, "timeline", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.timelines, "timeline", name)?;
        super::load_json(rel)
    }
}

/// Whole documents, optionally with frames worth checking.
pub mod documents {
    use super::*;

    pub fn keys() -> Vec<String> {
        let mut keys: Vec<_> = MANIFEST.documents.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.documents, "document", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.documents, "document", name)?;
        super::load_json(entry.as_path())
    }

    /// Frames the fixture is interesting at; empty when unspecified.
    pub fn frames(name: &str) -> Result<Vec<u32>> {
        let entry = lookup(&MANIFEST.documents, "document", name)?;
        Ok(entry.frames().to_vec())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.documents, "document", name)?;
        Ok(resolve_path(entry.as_path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_entries_resolve() {
        for name in timelines::keys() {
            timelines::json(&name).unwrap();
        }
        for name in documents::keys() {
            assert!(documents::path(&name).unwrap().exists(), "{name}");
        }
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        assert!(timelines::json("does-not-exist").is_err());
    }
}
