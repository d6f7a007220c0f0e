//! Image asset lookup with tiered fallback, plus upload staging.
//!
//! Layout under the assets root:
//!
//! ```text
//! pokemons/full-art/<id>.png   preferred tier
//! pokemons/<id>.png            standard tier, also where uploads land
//! pokemons/.staging/<uuid>.png uploads awaiting an id
//! types/<type>.png             type icons, no fallback
//! ```

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory (and URL segment) holding creature artwork.
pub const CREATURE_CATEGORY: &str = "pokemons";
pub const TYPE_CATEGORY: &str = "types";
const FULL_ART_DIR: &str = "full-art";
const STAGING_DIR: &str = ".staging";
const EXTENSION: &str = "png";

/// Which tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTier {
    FullArt,
    Standard,
    TypeIcon,
}

impl AssetTier {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetTier::FullArt => "full-art",
            AssetTier::Standard => "standard",
            AssetTier::TypeIcon => "type-icon",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    pub tier: AssetTier,
}

/// An uploaded image written to the staging area, not yet tied to a record.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
    public_base_url: String,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn full_art_path(&self, id: i64) -> PathBuf {
        self.root
            .join(CREATURE_CATEGORY)
            .join(FULL_ART_DIR)
            .join(format!("{id}.{EXTENSION}"))
    }

    pub fn standard_path(&self, id: i64) -> PathBuf {
        self.root
            .join(CREATURE_CATEGORY)
            .join(format!("{id}.{EXTENSION}"))
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(CREATURE_CATEGORY).join(STAGING_DIR)
    }

    /// Public URL stored in a record's `image` once an upload is attached.
    pub fn asset_url(&self, id: i64) -> String {
        format!("{}/assets/{CREATURE_CATEGORY}/{id}", self.public_base_url)
    }

    /// Full art first, then the standard image; `None` when neither exists.
    pub fn resolve_creature(&self, id: i64) -> Option<ResolvedAsset> {
        if id < 1 {
            return None;
        }
        let full_art = self.full_art_path(id);
        if full_art.is_file() {
            return Some(ResolvedAsset {
                path: full_art,
                tier: AssetTier::FullArt,
            });
        }
        let standard = self.standard_path(id);
        if standard.is_file() {
            return Some(ResolvedAsset {
                path: standard,
                tier: AssetTier::Standard,
            });
        }
        debug!(id, "no artwork on disk");
        None
    }

    /// Existence probe for the full-art tier only.
    pub fn has_full_art(&self, id: i64) -> bool {
        id >= 1 && self.full_art_path(id).is_file()
    }

    /// Type icon lookup; the name is lowercased and must be a plain slug.
    pub fn resolve_type(&self, type_name: &str) -> Option<ResolvedAsset> {
        let slug = type_name.trim().to_lowercase();
        let is_slug = !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !is_slug {
            return None;
        }
        let path = self
            .root
            .join(TYPE_CATEGORY)
            .join(format!("{slug}.{EXTENSION}"));
        path.is_file().then_some(ResolvedAsset {
            path,
            tier: AssetTier::TypeIcon,
        })
    }

    pub async fn read(&self, asset: &ResolvedAsset) -> Result<Vec<u8>> {
        tokio::fs::read(&asset.path)
            .await
            .with_context(|| format!("failed to read asset {}", asset.path.display()))
    }

    /// Write upload bytes under a temporary name until the record id is known.
    pub async fn stage_upload(&self, bytes: &[u8]) -> Result<StagedUpload> {
        let dir = self.staging_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(format!("{}.{EXTENSION}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to stage upload at {}", path.display()))?;
        debug!(path = %path.display(), size = bytes.len(), "upload staged");
        Ok(StagedUpload { path })
    }

    /// Move a staged upload to the standard path for `id`, replacing any previous image.
    pub async fn promote(&self, staged: &StagedUpload, id: i64) -> Result<PathBuf> {
        let target = self.standard_path(id);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&staged.path, &target)
            .await
            .with_context(|| {
                format!(
                    "failed to move {} to {}",
                    staged.path.display(),
                    target.display()
                )
            })?;
        Ok(target)
    }

    /// Remove a staged upload that will not be promoted. Missing files are fine.
    pub async fn discard(&self, staged: &StagedUpload) {
        match tokio::fs::remove_file(&staged.path).await {
            Ok(()) => debug!(path = %staged.path.display(), "staged upload discarded"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %staged.path.display(), error = %e, "failed to discard staged upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn prefers_full_art_then_standard() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path(), "");

        touch(&assets.standard_path(1), b"std");
        touch(&assets.standard_path(2), b"std");
        touch(&assets.full_art_path(2), b"full");

        let one = assets.resolve_creature(1).unwrap();
        assert_eq!(one.tier, AssetTier::Standard);
        assert_eq!(one.path, dir.path().join("pokemons/1.png"));
        assert!(!assets.has_full_art(1));

        let two = assets.resolve_creature(2).unwrap();
        assert_eq!(two.tier, AssetTier::FullArt);
        assert_eq!(two.path, dir.path().join("pokemons/full-art/2.png"));
        assert!(assets.has_full_art(2));

        assert_eq!(assets.resolve_creature(3), None);
        assert_eq!(assets.resolve_creature(0), None);
        assert_eq!(assets.resolve_creature(-2), None);
    }

    #[test]
    fn type_icons_are_lowercased_and_have_no_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path(), "");
        touch(&dir.path().join("types/fire.png"), b"icon");

        let fire = assets.resolve_type("FIRE").unwrap();
        assert_eq!(fire.tier, AssetTier::TypeIcon);
        assert_eq!(fire.path, dir.path().join("types/fire.png"));
        assert_eq!(assets.resolve_type("water"), None);
    }

    #[test]
    fn type_lookup_rejects_path_tricks() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path().join("assets"), "");
        touch(&dir.path().join("secret.png"), b"nope");

        assert_eq!(assets.resolve_type("../../secret"), None);
        assert_eq!(assets.resolve_type("fire/../fire"), None);
        assert_eq!(assets.resolve_type(""), None);
    }

    #[test]
    fn asset_url_uses_public_base() {
        assert_eq!(
            AssetResolver::new("assets", "").asset_url(7),
            "/assets/pokemons/7"
        );
        assert_eq!(
            AssetResolver::new("assets", "https://dex.example/").asset_url(7),
            "https://dex.example/assets/pokemons/7"
        );
    }

    #[tokio::test]
    async fn staged_upload_is_promoted_to_the_id_path() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path(), "");

        let staged = assets.stage_upload(b"png-bytes").await.unwrap();
        assert!(staged.path().starts_with(dir.path().join("pokemons/.staging")));

        let target = assets.promote(&staged, 42).await.unwrap();
        assert_eq!(target, assets.standard_path(42));
        assert!(!staged.path().exists());

        let resolved = assets.resolve_creature(42).unwrap();
        assert_eq!(assets.read(&resolved).await.unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn discard_removes_staged_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path(), "");
        let staged = assets.stage_upload(b"x").await.unwrap();
        assets.discard(&staged).await;
        assert!(!staged.path().exists());
        assets.discard(&staged).await;
    }
}
