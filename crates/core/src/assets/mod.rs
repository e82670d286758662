use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{OverlayError, Result};

/// Name under which the font used for comments without a family is stored.
pub const DEFAULT_FONT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Font,
    Image,
}

/// A shared render resource that items depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub size_bytes: usize,
}

/// Registry for all shared assets. Playback does not start animating until
/// every registered asset reports loaded.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: BTreeMap<String, Asset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            assets: BTreeMap::new(),
        }
    }

    pub fn register_font(&mut self, name: impl Into<String>, path: Option<PathBuf>) {
        self.register(name.into(), AssetKind::Font, path);
    }

    pub fn register_image(&mut self, name: impl Into<String>, path: Option<PathBuf>) {
        self.register(name.into(), AssetKind::Image, path);
    }

    fn register(&mut self, name: String, kind: AssetKind, path: Option<PathBuf>) {
        self.assets.insert(
            name.clone(),
            Asset {
                name,
                kind,
                path,
                loaded: false,
                size_bytes: 0,
            },
        );
    }

    /// Flags an asset as available. Returns `true` when this completed the
    /// store.
    pub fn mark_loaded(&mut self, name: &str) -> Result<bool> {
        let was_ready = self.is_ready();
        let asset = self
            .assets
            .get_mut(name)
            .ok_or_else(|| OverlayError::msg(format!("unknown asset `{name}`")))?;
        asset.loaded = true;
        tracing::debug!(name, kind = ?asset.kind, "asset loaded");
        Ok(!was_ready && self.is_ready())
    }

    /// Reads the asset from its registered path and flags it as loaded.
    pub fn load_from_disk(&mut self, name: &str) -> Result<bool> {
        let path = self
            .assets
            .get(name)
            .ok_or_else(|| OverlayError::msg(format!("unknown asset `{name}`")))?
            .path
            .clone()
            .ok_or_else(|| OverlayError::msg(format!("asset `{name}` has no path")))?;

        let bytes = read_asset(&path)?;
        if let Some(asset) = self.assets.get_mut(name) {
            asset.size_bytes = bytes;
        }
        self.mark_loaded(name)
    }

    pub fn is_ready(&self) -> bool {
        self.assets.values().all(|asset| asset.loaded)
    }

    /// Names of assets still being loaded.
    pub fn pending(&self) -> Vec<&str> {
        self.assets
            .values()
            .filter(|asset| !asset.loaded)
            .map(|asset| asset.name.as_str())
            .collect()
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    /// Resolves the font a comment asks for. Comments without a family use
    /// [`DEFAULT_FONT`].
    pub fn resolve_font(&self, family: Option<&str>) -> Result<&Asset> {
        let name = family.unwrap_or(DEFAULT_FONT);
        match self.assets.get(name) {
            Some(asset) if asset.kind != AssetKind::Font => Err(OverlayError::msg(format!(
                "asset `{name}` referenced by comment is not a font"
            ))),
            Some(asset) if !asset.loaded => Err(OverlayError::MissingAsset(name.to_string())),
            Some(asset) => Ok(asset),
            None => Err(OverlayError::msg(format!(
                "unknown font `{name}` referenced by comment"
            ))),
        }
    }

    /// Font names among `families` that do not resolve, each reported once
    /// with the reason.
    pub fn unresolved_fonts<'a, I>(&self, families: I) -> BTreeMap<String, OverlayError>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut unresolved = BTreeMap::new();
        for family in families {
            let name = family.unwrap_or(DEFAULT_FONT);
            if unresolved.contains_key(name) {
                continue;
            }
            if let Err(err) = self.resolve_font(family) {
                unresolved.insert(name.to_string(), err);
            }
        }
        unresolved
    }
}

fn read_asset(path: &Path) -> Result<usize> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(OverlayError::InvalidInput("asset file is empty"));
    }
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn becomes_ready_once_every_asset_loads() {
        let mut store = AssetStore::new();
        assert!(store.is_ready());

        store.register_font(DEFAULT_FONT, None);
        store.register_image("logo", None);
        assert!(!store.is_ready());
        assert_eq!(store.pending(), vec!["default", "logo"]);

        assert!(!store.mark_loaded("logo").unwrap());
        assert!(store.mark_loaded(DEFAULT_FONT).unwrap());
        assert!(store.is_ready());
        assert!(!store.mark_loaded(DEFAULT_FONT).unwrap());
    }

    #[test]
    fn resolves_registered_fonts() {
        let mut store = AssetStore::new();
        store.register_font(DEFAULT_FONT, None);
        store.register_font("SimHei", None);

        let err = store.resolve_font(Some("SimHei")).unwrap_err();
        assert!(err.is_retryable());

        store.mark_loaded("SimHei").unwrap();
        assert_eq!(store.resolve_font(Some("SimHei")).unwrap().name, "SimHei");
        assert!(store.resolve_font(None).is_err());
    }

    #[test]
    fn errors_on_missing_assets() {
        let mut store = AssetStore::new();
        store.register_image("logo", None);

        let err = store.resolve_font(Some("missing")).unwrap_err();
        assert!(format!("{err}").contains("missing"));
        assert!(store.resolve_font(Some("logo")).is_err());
        assert!(store.mark_loaded("nope").is_err());
    }

    #[test]
    fn reports_each_unresolved_family_once() {
        let mut store = AssetStore::new();
        store.register_font(DEFAULT_FONT, None);
        store.register_font("Serif", None);
        store.mark_loaded(DEFAULT_FONT).unwrap();

        let families = [None, Some("SimHei"), Some("Serif"), Some("SimHei"), None, Some("Serif")];
        let unresolved = store.unresolved_fonts(families);

        let names: Vec<&str> = unresolved.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Serif", "SimHei"]);
        assert!(unresolved["Serif"].is_retryable());
        assert!(!unresolved["SimHei"].is_retryable());
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("overlay-font-{}.bin", std::process::id()));
        std::fs::write(&path, b"glyphs").unwrap();

        let mut store = AssetStore::new();
        store.register_font(DEFAULT_FONT, Some(path.clone()));
        assert!(store.load_from_disk(DEFAULT_FONT).unwrap());
        assert_eq!(store.asset(DEFAULT_FONT).unwrap().size_bytes, 6);

        std::fs::remove_file(&path).unwrap();
        store.register_font("gone", Some(path));
        assert!(matches!(
            store.load_from_disk("gone"),
            Err(OverlayError::Io(_))
        ));
    }
}
