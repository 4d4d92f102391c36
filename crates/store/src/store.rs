use crate::error::{Result, StoreError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use ystr_protocol::Profile;

/// Durable keyed storage of canonical profiles.
///
/// Profiles live in memory keyed by kit number and are mirrored to a JSON
/// snapshot on disk. Every mutating call is a single transaction: the new
/// snapshot is staged to a temp file and renamed over the old one, and the
/// in-memory map is rolled back if the write fails, so a batch either lands
/// completely or not at all.
pub struct ProfileStore {
    profiles: BTreeMap<String, Profile>,
    path: PathBuf,
}

impl ProfileStore {
    /// Open the store at `path`, loading any existing snapshot.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath("empty path".to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let profiles = if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            let raw: BTreeMap<String, Profile> = serde_json::from_str(&data)?;
            let mut profiles = BTreeMap::new();
            for (kit, profile) in raw {
                // key must equal the profile's own kit number
                if kit != profile.kit_number {
                    log::warn!(
                        "Dropping corrupt store entry: key {kit:?} holds kit {:?}",
                        profile.kit_number
                    );
                    continue;
                }
                profiles.insert(kit, profile);
            }
            log::info!("Loaded {} profiles from {}", profiles.len(), path.display());
            profiles
        } else {
            BTreeMap::new()
        };

        Ok(Self { profiles, path })
    }

    /// Upsert a batch of profiles (overwrite-on-conflict by kit number).
    ///
    /// Profiles with an empty kit number are skipped, never stored. The
    /// whole batch commits atomically.
    pub async fn save_profiles(&mut self, profiles: &[Profile]) -> Result<()> {
        if profiles.is_empty() {
            return Ok(());
        }

        let mut displaced: Vec<(String, Option<Profile>)> = Vec::new();
        for profile in profiles {
            if profile.kit_number.is_empty() {
                log::warn!("Skipping profile with empty kit number");
                continue;
            }
            let kit = profile.kit_number.clone();
            let previous = self.profiles.insert(kit.clone(), profile.clone());
            displaced.push((kit, previous));
        }

        if let Err(err) = self.persist().await {
            // roll back so memory still mirrors the last good snapshot
            for (kit, previous) in displaced.into_iter().rev() {
                match previous {
                    Some(profile) => self.profiles.insert(kit, profile),
                    None => self.profiles.remove(&kit),
                };
            }
            return Err(err);
        }

        log::debug!(
            "Saved batch of {} profiles. Total: {}",
            profiles.len(),
            self.profiles.len()
        );
        Ok(())
    }

    /// All stored profiles, ordered by kit number.
    pub fn profiles(&self) -> Vec<Profile> {
        self.profiles.values().cloned().collect()
    }

    pub fn get(&self, kit_number: &str) -> Option<&Profile> {
        self.profiles.get(kit_number)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every stored profile.
    pub async fn clear_profiles(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.profiles);
        if let Err(err) = self.persist().await {
            self.profiles = previous;
            return Err(err);
        }
        log::info!("Cleared profile store at {}", self.path.display());
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let data = serde_json::to_string(&self.profiles)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}
