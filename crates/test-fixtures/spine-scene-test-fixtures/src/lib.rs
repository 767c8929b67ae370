use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    skeletons: HashMap<String, SkeletonEntry>,
}

#[derive(Debug, Deserialize)]
struct SkeletonEntry {
    skeleton: String,
    #[serde(default)]
    atlas: Option<String>,
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

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Skeleton documents and their (optional) atlases.
pub mod skeletons {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.skeletons.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.skeletons, "skeleton", name)?;
        read_to_string(&entry.skeleton)
    }

    /// Atlas text, or `None` for skeleton-only fixtures.
    pub fn atlas(name: &str) -> Result<Option<String>> {
        let entry = lookup(&MANIFEST.skeletons, "skeleton", name)?;
        match &entry.atlas {
            Some(atlas) => read_to_string(atlas).map(Some),
            None => Ok(None),
        }
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.skeletons, "skeleton", name)?;
        Ok(resolve_path(&entry.skeleton))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_is_readable() {
        for key in skeletons::keys() {
            skeletons::json(&key).unwrap_or_else(|e| panic!("{key}: {e:#}"));
            skeletons::atlas(&key).unwrap_or_else(|e| panic!("{key}: {e:#}"));
        }
        assert!(skeletons::json("missing").is_err());
    }
}
