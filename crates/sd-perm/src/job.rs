//! Recherche de permutations sur un thread dédié.
//!
//! La passe de tramage continue avec sa table courante pendant que la
//! nouvelle est calculée ; le résultat arrive par un canal flume.

use std::thread;

use anyhow::{Context, Result};
use sd_core::DitherError;
use sd_core::config::SearchSettings;

use crate::table::PermutationTable;

/// Handle on a background table build.
pub struct SearchJob {
    n: usize,
    rx: flume::Receiver<Result<PermutationTable, DitherError>>,
}

impl SearchJob {
    /// Start building a table of side `n` on a named thread.
    ///
    /// # Errors
    /// The thread could not be spawned.
    ///
    /// # Example
    /// ```
    /// use sd_core::config::SearchSettings;
    /// use sd_perm::job::SearchJob;
    /// let settings = SearchSettings { max_results: 8, ..SearchSettings::default() };
    /// let job = SearchJob::spawn(3, settings).unwrap();
    /// assert_eq!(job.wait().unwrap().len(), 8);
    /// ```
    pub fn spawn(n: usize, settings: SearchSettings) -> Result<Self> {
        let (tx, rx) = flume::bounded(1);
        thread::Builder::new()
            .name(format!("perm_search_{n}x{n}"))
            .spawn(move || {
                let result = PermutationTable::build(n, &settings);
                if let Err(e) = &result {
                    log::error!("Recherche {n}x{n} échouée : {e}");
                }
                // Receiver dropped = job abandoned.
                let _ = tx.send(result);
            })
            .context("Lancement du thread de recherche")?;
        log::debug!("Recherche {n}x{n} lancée en arrière-plan");
        Ok(Self { n, rx })
    }

    /// Matrix side being searched.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Non-blocking poll. `None` while the search is still running.
    ///
    /// # Errors
    /// The search failed, or its thread ended without a result.
    pub fn try_take(&self) -> Option<Result<PermutationTable, DitherError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(flume::TryRecvError::Empty) => None,
            Err(flume::TryRecvError::Disconnected) => {
                Some(Err(DitherError::SearchAborted { n: self.n }))
            }
        }
    }

    /// Block until the table is ready.
    ///
    /// # Errors
    /// The search failed, or its thread ended without a result.
    pub fn wait(self) -> Result<PermutationTable, DitherError> {
        self.rx
            .recv()
            .unwrap_or(Err(DitherError::SearchAborted { n: self.n }))
    }
}
