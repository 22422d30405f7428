//! Passe de tramage par frame.
//!
//! Possède l'état qui survit entre les frames : tables de permutation,
//! réservoir temporel, whitelist de matériaux, compteur de frame, et une
//! éventuelle recherche de table en arrière-plan.

use std::collections::BTreeSet;

use anyhow::Result;
use rayon::prelude::*;
use sd_core::whitelist::join_names;
use sd_core::{DecisionBuffer, DitherConfig, DitherError, FragmentBuffer, MaterialWhitelist, PixelKey};
use sd_perm::job::SearchJob;

use crate::grid::TableSet;
use crate::mode::DitherMode;
use crate::noise::{NoiseSource, ProceduralNoise};
use crate::policy::DitherPolicy;
use crate::reservoir::{ReservoirRecord, TemporalReservoir};

/// Statistiques d'une frame exécutée.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    /// Frame index the decisions were made for.
    pub frame: u32,
    /// Surviving fragments.
    pub survivors: usize,
    /// Evaluated fragments.
    pub pixels: usize,
    /// Mean clamped coverage of the input.
    pub mean_coverage: f64,
}

impl FrameStats {
    /// Fraction of surviving fragments.
    #[must_use]
    pub fn survival_rate(&self) -> f64 {
        if self.pixels == 0 {
            0.0
        } else {
            self.survivors as f64 / self.pixels as f64
        }
    }
}

/// La passe : configuration figée, état temporel et ressources partagées.
///
/// # Example
/// ```
/// use sd_core::{DecisionBuffer, DitherConfig, FragmentBuffer};
/// use sd_core::config::ModeKind;
/// use sd_dither::pass::DitherPass;
///
/// let config = DitherConfig { mode: ModeKind::Grid2x2, ..DitherConfig::default() };
/// let mut pass = DitherPass::new(config).unwrap();
/// let mut input = FragmentBuffer::new(8, 8).unwrap();
/// for f in &mut input.fragments { f.coverage = 0.5; }
/// let mut out = DecisionBuffer::new(8, 8);
/// let stats = pass.execute(&input, &mut out).unwrap();
/// assert_eq!(stats.survivors, 32);
/// ```
pub struct DitherPass {
    config: DitherConfig,
    mode: DitherMode,
    tables: TableSet,
    noise: Box<dyn NoiseSource>,
    reservoir: TemporalReservoir,
    whitelist_names: BTreeSet<String>,
    scene_materials: Vec<String>,
    whitelist: Option<MaterialWhitelist>,
    frame_count: u32,
    jobs: Vec<SearchJob>,
}

impl DitherPass {
    /// Build the pass and the tables its mode needs.
    ///
    /// # Errors
    /// A table could not be built.
    pub fn new(config: DitherConfig) -> Result<Self> {
        let noise = Box::new(ProceduralNoise::new(config.noise_pattern, 0));
        let mut pass = Self {
            mode: DitherMode::from_config(&config),
            whitelist_names: config.whitelist.iter().cloned().collect(),
            config,
            tables: TableSet::default(),
            noise,
            reservoir: TemporalReservoir::default(),
            scene_materials: Vec::new(),
            whitelist: None,
            frame_count: 0,
            jobs: Vec::new(),
        };
        pass.tables.ensure(pass.mode.table_sizes(), &pass.config.search)?;
        log::info!("Passe de tramage prête : mode {}", pass.mode.kind().name());
        Ok(pass)
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DitherConfig {
        &self.config
    }

    /// Mode of the next frame.
    #[must_use]
    pub fn mode(&self) -> &DitherMode {
        &self.mode
    }

    /// Index of the next frame.
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Temporal history.
    #[must_use]
    pub fn reservoir(&self) -> &TemporalReservoir {
        &self.reservoir
    }

    /// Permutation tables currently installed.
    #[must_use]
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// Remplace la configuration (hot-reload).
    ///
    /// Les tables sont jetées si les paramètres de recherche changent ; une
    /// table manquante pour le nouveau mode est construite en arrière-plan
    /// si `background` est vrai, sinon immédiatement.
    ///
    /// # Errors
    /// A synchronous table build or a background thread spawn failed.
    pub fn set_config(&mut self, config: DitherConfig, background: bool) -> Result<()> {
        if config.search != self.config.search {
            log::info!("Paramètres de recherche modifiés, tables invalidées");
            self.tables.clear();
            self.jobs.clear();
        }
        if config.noise_pattern != self.config.noise_pattern {
            self.noise = Box::new(ProceduralNoise::new(config.noise_pattern, 0));
        }
        let names: BTreeSet<String> = config.whitelist.iter().cloned().collect();
        let whitelist_changed = names != self.whitelist_names || config.use_whitelist != self.config.use_whitelist;

        let mode = DitherMode::from_config(&config);
        if mode.kind() != self.mode.kind() {
            log::info!("Mode de tramage : {} -> {}", self.mode.kind().name(), mode.kind().name());
        }
        self.mode = mode;
        self.config = config;
        if whitelist_changed {
            self.whitelist_names = names;
            self.rebuild_whitelist();
        }

        if background {
            for &n in self.mode.table_sizes() {
                self.request_table(n)?;
            }
        } else {
            self.tables.ensure(self.mode.table_sizes(), &self.config.search)?;
        }
        Ok(())
    }

    /// Replace the threshold texture of the noise-based modes.
    pub fn set_noise(&mut self, noise: Box<dyn NoiseSource>) {
        self.noise = noise;
    }

    /// Nouvelle scène : whitelist reconstruite pour ses matériaux, historique oublié.
    ///
    /// Returns `true` when at least one material is whitelisted. The whitelist
    /// is active only if enabled in the configuration and non-empty.
    pub fn set_scene<'a, I>(&mut self, materials: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.reservoir.invalidate();
        self.scene_materials = materials.into_iter().map(String::from).collect();
        self.rebuild_whitelist()
    }

    /// Repack the whitelist for the current scene and names.
    fn rebuild_whitelist(&mut self) -> bool {
        let (packed, any) =
            MaterialWhitelist::build(&self.whitelist_names, self.scene_materials.iter().map(String::as_str));
        if self.config.use_whitelist && !any {
            log::warn!(
                "Aucun matériau de la scène n'est dans la whitelist [{}], tramage appliqué partout",
                join_names(&self.whitelist_names)
            );
        }
        self.whitelist = (self.config.use_whitelist && any).then_some(packed);
        any
    }

    /// Lance la construction de la table `n` en arrière-plan, sauf si elle
    /// existe ou est déjà en cours.
    ///
    /// # Errors
    /// The search thread could not be spawned.
    pub fn request_table(&mut self, n: usize) -> Result<()> {
        if self.tables.contains(n) || self.jobs.iter().any(|j| j.n() == n) {
            return Ok(());
        }
        self.jobs.push(SearchJob::spawn(n, self.config.search.clone())?);
        Ok(())
    }

    /// Install finished background tables. Returns how many were installed.
    pub fn poll_tables(&mut self) -> usize {
        let mut installed = 0;
        let mut pending = Vec::with_capacity(self.jobs.len());
        for job in self.jobs.drain(..) {
            match job.try_take() {
                None => pending.push(job),
                Some(Ok(table)) => {
                    log::info!("Table {0}x{0} installée ({1} entrées)", table.n(), table.len());
                    self.tables.insert(table);
                    installed += 1;
                }
                Some(Err(e)) => log::error!("Recherche de table échouée : {e}"),
            }
        }
        self.jobs = pending;
        installed
    }

    /// Block on the background searches the current mode needs.
    fn wait_for_needed_tables(&mut self) -> Result<(), DitherError> {
        let needed = self.mode.table_sizes();
        let (wait, keep): (Vec<_>, Vec<_>) = self.jobs.drain(..).partition(|j| needed.contains(&j.n()));
        self.jobs = keep;
        for job in wait {
            if !self.tables.contains(job.n()) {
                self.tables.insert(job.wait()?);
            }
        }
        Ok(())
    }

    /// Évalue une frame complète.
    ///
    /// Les lignes sont traitées en parallèle. En mode réservoir, la frame lit
    /// le buffer d'historique et écrit l'autre, puis les rôles s'échangent.
    ///
    /// # Errors
    /// Input and output sizes differ, or a needed table failed to build.
    pub fn execute(&mut self, fragments: &FragmentBuffer, out: &mut DecisionBuffer) -> Result<FrameStats> {
        let (w, h) = (fragments.width, fragments.height);
        if out.width != w || out.height != h {
            return Err(DitherError::BufferMismatch {
                input_width: w,
                input_height: h,
                output_width: out.width,
                output_height: out.height,
            }
            .into());
        }

        self.poll_tables();
        self.wait_for_needed_tables()?;
        self.tables.ensure(self.mode.table_sizes(), &self.config.search)?;

        let frame = self.frame_count;
        let ris_active = self.mode.uses_reservoir();
        if ris_active && self.reservoir.ensure_resolution(w, h) {
            log::debug!("Historique réinitialisé ({w}x{h})");
        }

        let policy = DitherPolicy {
            mode: &self.mode,
            tables: &self.tables,
            noise: self.noise.as_ref(),
            whitelist: self.whitelist.as_ref(),
        };
        let width = w as usize;
        let rows = out
            .survive
            .par_chunks_mut(width)
            .zip(out.debug.par_chunks_mut(width))
            .zip(fragments.fragments.par_chunks(width))
            .enumerate();

        if ris_active {
            let valid = self.reservoir.is_valid();
            let (read, write) = self.reservoir.split();
            rows.zip(write.par_chunks_mut(width))
                .for_each(|((y, ((survive, debug), input)), history_out)| {
                    let history_in = &read[y * width..(y + 1) * width];
                    let cells = survive
                        .iter_mut()
                        .zip(debug.iter_mut())
                        .zip(input)
                        .zip(history_in.iter().zip(history_out.iter_mut()));
                    for (x, (((s, dbg), frag), (prev, next))) in cells.enumerate() {
                        let key = PixelKey::new(x as u32, y as u32, frame);
                        let history = valid.then(|| ReservoirRecord::unpack(*prev));
                        let d = policy.evaluate(key, frag, history);
                        *s = d.survive;
                        *dbg = d.debug.unwrap_or_default();
                        // Alpha-tested fragments keep their history.
                        *next = d.record.map_or(*prev, |r| r.pack());
                    }
                });
        } else {
            rows.for_each(|(y, ((survive, debug), input))| {
                let cells = survive.iter_mut().zip(debug.iter_mut()).zip(input);
                for (x, ((s, dbg), frag)) in cells.enumerate() {
                    let d = policy.evaluate(PixelKey::new(x as u32, y as u32, frame), frag, None);
                    *s = d.survive;
                    *dbg = d.debug.unwrap_or_default();
                }
            });
        }

        self.reservoir.end_frame(ris_active);
        self.frame_count = self.frame_count.wrapping_add(1);

        let stats = FrameStats {
            frame,
            survivors: out.survivor_count(),
            pixels: out.survive.len(),
            mean_coverage: fragments
                .fragments
                .iter()
                .map(|f| f64::from(if f.coverage.is_nan() { 0.0 } else { f.coverage.clamp(0.0, 1.0) }))
                .sum::<f64>()
                / fragments.len().max(1) as f64,
        };
        log::debug!(
            "Frame {} : {}/{} survivants ({:.3}, couverture moyenne {:.3})",
            stats.frame,
            stats.survivors,
            stats.pixels,
            stats.survival_rate(),
            stats.mean_coverage
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::config::{ModeKind, SearchSettings};

    fn uniform_input(w: u32, h: u32, c: f32) -> FragmentBuffer {
        let mut input = FragmentBuffer::new(w, h).unwrap();
        for f in &mut input.fragments {
            f.coverage = c;
        }
        input
    }

    fn config(mode: ModeKind) -> DitherConfig {
        DitherConfig {
            mode,
            search: SearchSettings {
                max_results: 8,
                anneal_iterations: 10_000,
                seed: Some(9),
                ..SearchSettings::default()
            },
            ..DitherConfig::default()
        }
    }

    #[test]
    fn reservoir_lifecycle_over_frames() {
        let mut pass = DitherPass::new(config(ModeKind::Reservoir)).unwrap();
        let input = uniform_input(16, 8, 0.3);
        let mut out = DecisionBuffer::new(16, 8);

        assert!(!pass.reservoir().is_valid());
        pass.execute(&input, &mut out).unwrap();
        assert!(pass.reservoir().is_valid());
        assert_eq!(pass.reservoir().read_index(), 1);
        pass.execute(&input, &mut out).unwrap();
        assert_eq!(pass.reservoir().read_index(), 0);

        // Another mode leaves the history untouched.
        pass.set_config(config(ModeKind::RussianRoulette), false).unwrap();
        pass.execute(&input, &mut out).unwrap();
        assert_eq!(pass.reservoir().read_index(), 0);
        assert!(pass.reservoir().is_valid());

        pass.set_scene(["Glass"]);
        assert!(!pass.reservoir().is_valid());
    }

    #[test]
    fn reservoir_mean_converges_per_pixel() {
        let mut pass = DitherPass::new(config(ModeKind::Reservoir)).unwrap();
        let input = uniform_input(8, 8, 0.3);
        let mut out = DecisionBuffer::new(8, 8);
        let mut counts = vec![0u32; 64];
        let frames = 2_000;
        for _ in 0..frames {
            pass.execute(&input, &mut out).unwrap();
            for (c, s) in counts.iter_mut().zip(&out.survive) {
                *c += u32::from(*s);
            }
        }
        for c in counts {
            let rate = f64::from(c) / f64::from(frames);
            assert!((rate - 0.3).abs() < 0.005, "{rate}");
        }
    }

    #[test]
    fn disabled_passes_everything() {
        let mut pass = DitherPass::new(config(ModeKind::Disabled)).unwrap();
        let input = uniform_input(5, 3, 0.0);
        let mut out = DecisionBuffer::new(5, 3);
        let stats = pass.execute(&input, &mut out).unwrap();
        assert_eq!(stats.survivors, 15);
        assert_eq!(pass.frame_count(), 1);
    }

    #[test]
    fn grid_survivors_per_tile() {
        let mut pass = DitherPass::new(config(ModeKind::Grid4x4)).unwrap();
        let input = uniform_input(16, 16, 0.3);
        let mut out = DecisionBuffer::new(16, 16);
        pass.execute(&input, &mut out).unwrap();
        let level = (0.3f32 * 16.0).round() as usize;
        for ty in 0..4 {
            for tx in 0..4 {
                let n = (0..4)
                    .flat_map(|y| (0..4).map(move |x| (tx * 4 + x, ty * 4 + y)))
                    .filter(|&(x, y)| out.survive[y * 16 + x])
                    .count();
                assert_eq!(n, level);
            }
        }
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let mut pass = DitherPass::new(config(ModeKind::Disabled)).unwrap();
        let input = uniform_input(4, 4, 1.0);
        let mut out = DecisionBuffer::new(4, 5);
        let err = pass.execute(&input, &mut out).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DitherError>(),
            Some(&DitherError::BufferMismatch {
                input_width: 4,
                input_height: 4,
                output_width: 4,
                output_height: 5,
            })
        );
        assert_eq!(pass.frame_count(), 0);
    }

    #[test]
    fn background_table_is_installed_before_use() {
        let mut pass = DitherPass::new(config(ModeKind::Disabled)).unwrap();
        pass.set_config(config(ModeKind::Grid3x3), true).unwrap();
        let input = uniform_input(9, 9, 0.5);
        let mut out = DecisionBuffer::new(9, 9);
        pass.execute(&input, &mut out).unwrap();
        assert!(pass.tables().contains(3));
        assert_eq!(out.survivor_count(), 9 * 5);
    }

    #[test]
    fn whitelist_needs_a_match() {
        let mut cfg = config(ModeKind::RussianRoulette);
        cfg.use_whitelist = true;
        cfg.whitelist = vec!["Leaves".into()];
        let mut pass = DitherPass::new(cfg).unwrap();
        assert!(!pass.set_scene(["Stone", "Glass"]));
        assert!(pass.set_scene(["Stone", "Leaves"]));

        // Material 0 is not whitelisted: alpha test.
        let input = uniform_input(8, 8, 0.4);
        let mut out = DecisionBuffer::new(8, 8);
        assert_eq!(pass.execute(&input, &mut out).unwrap().survivors, 0);
    }

    #[test]
    fn whitelist_follows_config_changes() {
        let mut pass = DitherPass::new(config(ModeKind::RussianRoulette)).unwrap();
        assert!(!pass.set_scene(["Stone", "Leaves"]));

        let mut cfg = config(ModeKind::RussianRoulette);
        cfg.use_whitelist = true;
        cfg.whitelist = vec!["Leaves".into()];
        pass.set_config(cfg.clone(), false).unwrap();

        // Material 0 (Stone) is not whitelisted: alpha test at 0.4.
        let input = uniform_input(32, 32, 0.4);
        let mut out = DecisionBuffer::new(32, 32);
        assert_eq!(pass.execute(&input, &mut out).unwrap().survivors, 0);

        // Stone joins the list: dithered again.
        cfg.whitelist = vec!["Stone".into(), "Leaves".into()];
        pass.set_config(cfg.clone(), false).unwrap();
        let stats = pass.execute(&input, &mut out).unwrap();
        assert!((stats.survival_rate() - 0.4).abs() < 0.08, "{stats:?}");

        // Back to Leaves only, then whitelisting turned off.
        cfg.whitelist = vec!["Leaves".into()];
        pass.set_config(cfg.clone(), false).unwrap();
        assert_eq!(pass.execute(&input, &mut out).unwrap().survivors, 0);
        cfg.use_whitelist = false;
        pass.set_config(cfg, false).unwrap();
        assert!(pass.execute(&input, &mut out).unwrap().survivors > 0);
    }

    #[test]
    fn alpha_tested_fragments_keep_reservoir_history() {
        let mut cfg = config(ModeKind::Reservoir);
        cfg.use_whitelist = true;
        cfg.whitelist = vec!["Leaves".into()];
        let mut pass = DitherPass::new(cfg).unwrap();
        pass.set_scene(["Stone", "Leaves"]);

        let mut input = uniform_input(8, 4, 0.3);
        for f in &mut input.fragments {
            f.material_id = 1;
        }
        let mut out = DecisionBuffer::new(8, 4);
        pass.execute(&input, &mut out).unwrap();
        pass.execute(&input, &mut out).unwrap();
        let history = pass.reservoir().read_buffer().to_vec();
        assert!(history.iter().any(|&w| w != 0));

        // Stone covers the frame: alpha-tested, nothing accumulated.
        for f in &mut input.fragments {
            f.material_id = 0;
        }
        pass.execute(&input, &mut out).unwrap();
        assert_eq!(pass.reservoir().read_buffer(), history.as_slice());
        pass.execute(&input, &mut out).unwrap();
        assert_eq!(pass.reservoir().read_buffer(), history.as_slice());
    }
}
