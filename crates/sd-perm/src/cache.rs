//! Cache disque des tables de permutation (bincode).
//!
//! Une entrée n'est réutilisée que si elle a été produite pour la même taille
//! et les mêmes paramètres de recherche. Un fichier illisible ou périmé est
//! simplement reconstruit.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sd_core::config::SearchSettings;
use serde::{Deserialize, Serialize};

use crate::table::PermutationTable;

/// Paramètres qui déterminent le contenu d'une table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    /// Matrix side.
    pub n: usize,
    /// Search parameters the table was built with.
    pub settings: SearchSettings,
}

impl CacheKey {
    /// Key for a table of side `n`.
    #[must_use]
    pub fn new(n: usize, settings: &SearchSettings) -> Self {
        Self {
            n,
            settings: settings.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CachedTable {
    key: CacheKey,
    table: PermutationTable,
}

/// Load the cached table if its key matches.
///
/// # Errors
/// Only I/O errors other than a missing file; undecodable content is `Ok(None)`.
pub fn load(path: &Path, key: &CacheKey) -> Result<Option<PermutationTable>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Lecture du cache {}", path.display()));
        }
    };
    match bincode::deserialize::<CachedTable>(&bytes) {
        Ok(cached) if cached.key == *key => Ok(Some(cached.table)),
        Ok(_) => {
            log::info!("Cache {} périmé (paramètres différents)", path.display());
            Ok(None)
        }
        Err(e) => {
            log::warn!("Cache {} illisible : {e}", path.display());
            Ok(None)
        }
    }
}

/// Write a table and its key.
///
/// # Errors
/// Serialization or write failure.
pub fn save(path: &Path, key: &CacheKey, table: &PermutationTable) -> Result<()> {
    let bytes = bincode::serialize(&CachedTable {
        key: key.clone(),
        table: table.clone(),
    })
    .context("Sérialisation de la table")?;
    fs::write(path, bytes).with_context(|| format!("Écriture du cache {}", path.display()))?;
    log::debug!("Table {}x{} écrite dans {}", key.n, key.n, path.display());
    Ok(())
}

/// Return the cached table, or run the search and store its result.
///
/// # Errors
/// Search failure (unsupported size) or cache write failure.
///
/// # Example
/// ```
/// use sd_core::config::SearchSettings;
/// use sd_perm::cache::load_or_build;
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("perm3.bin");
/// let settings = SearchSettings { max_results: 4, ..SearchSettings::default() };
/// let first = load_or_build(&path, 3, &settings).unwrap();
/// let second = load_or_build(&path, 3, &settings).unwrap();
/// assert_eq!(first, second);
/// ```
pub fn load_or_build(path: &Path, n: usize, settings: &SearchSettings) -> Result<PermutationTable> {
    let key = CacheKey::new(n, settings);
    if let Some(table) = load(path, &key)? {
        log::info!("Table {n}x{n} chargée depuis {}", path.display());
        return Ok(table);
    }
    let table = PermutationTable::build(n, settings)?;
    save(path, &key, &table)?;
    Ok(table)
}
