use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use sd_core::DitherConfig;

/// Relit le fichier et remplace la config. Retourne `true` si elle a changé.
///
/// En cas d'erreur on garde l'ancienne config.
pub fn reload_config(path: &Path, config: &ArcSwap<DitherConfig>) -> bool {
    match sd_core::config::load_config(path) {
        Ok(new_config) => {
            if **config.load() == new_config {
                return false;
            }
            config.store(Arc::new(new_config));
            log::info!("Config rechargée depuis {}", path.display());
            true
        }
        Err(e) => {
            log::warn!("Erreur de rechargement config : {e:#}");
            false
        }
    }
}

/// Lance un watcher qui met à jour l'ArcSwap et signale chaque rechargement
/// sur `reloaded`.
///
/// Retourne le Watcher (doit rester vivant tant que l'app tourne).
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
pub fn spawn_config_watcher(
    config_path: &Path,
    config: &Arc<ArcSwap<DitherConfig>>,
    reloaded: flume::Sender<()>,
) -> Result<impl Watcher + use<>> {
    let config = Arc::clone(config);
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res
            && matches!(event.kind, EventKind::Modify(_))
            && reload_config(&path, &config)
        {
            // Receiver gone: the app is shutting down.
            let _ = reloaded.send(());
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use sd_core::config::ModeKind;

    use super::*;

    #[test]
    fn reload_swaps_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dither.toml");
        std::fs::write(&path, "[dither]\nmode = \"Grid3x3\"\n").unwrap();
        let config = ArcSwap::from_pointee(DitherConfig::default());

        assert!(!reload_config(&path, &config));

        std::fs::write(&path, "[dither]\nmode = \"Reservoir\"\n").unwrap();
        assert!(reload_config(&path, &config));
        assert_eq!(config.load().mode, ModeKind::Reservoir);
    }

    #[test]
    fn broken_file_keeps_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dither.toml");
        std::fs::write(&path, "[dither\nmode = ").unwrap();
        let config = ArcSwap::from_pointee(DitherConfig {
            mode: ModeKind::Fractal,
            ..DitherConfig::default()
        });
        assert!(!reload_config(&path, &config));
        assert_eq!(config.load().mode, ModeKind::Fractal);
    }
}
