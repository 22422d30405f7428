//! Sous-commande `simulate` : passe de tramage sur une rampe synthétique.
//!
//! La couverture croît de 0 à 1 de gauche à droite, la profondeur de haut en
//! bas. Chaque bande de 16 lignes est un objet distinct et les matériaux
//! alternent toutes les 8 lignes.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use image::{GrayImage, Luma, Rgb, RgbImage};
use sd_core::config::AdaptiveDebugView;
use sd_core::{DecisionBuffer, DitherConfig, FragmentBuffer};
use sd_dither::{DitherPass, TextureNoise};

use crate::cli::SimulateArgs;
use crate::hotreload;

/// Bilan d'une simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationReport {
    pub frames: u32,
    /// Survivors over all pixels and frames.
    pub survival_rate: f64,
    /// Mean coverage of the ramp.
    pub mean_coverage: f64,
    /// Mean |accumulated rate − coverage| per pixel.
    pub mean_abs_error: f64,
}

/// État d'une simulation : la passe et ses buffers, réutilisés entre runs.
pub struct Simulation {
    pass: DitherPass,
    input: FragmentBuffer,
    output: DecisionBuffer,
    counts: Vec<u32>,
}

/// Rampe de couverture synthétique.
///
/// # Errors
/// Zero dimension.
pub fn coverage_ramp(width: u32, height: u32, depth_far: f32) -> Result<FragmentBuffer> {
    let mut input = FragmentBuffer::new(width, height)?;
    let w = width.saturating_sub(1).max(1) as f32;
    let h = height.saturating_sub(1).max(1) as f32;
    for y in 0..height {
        for x in 0..width {
            let f = input.get_mut(x, y);
            f.coverage = x as f32 / w;
            f.object_id = y / 16;
            f.material_id = (y / 8) % 2;
            f.depth = Some(y as f32 / h * depth_far);
            f.frequency = Some(0.5);
        }
    }
    Ok(input)
}

impl Simulation {
    /// Build the pass for `config` over a `width × height` ramp.
    ///
    /// # Errors
    /// Invalid dimensions, table build or noise texture failure.
    pub fn new(config: DitherConfig, args: &SimulateArgs) -> Result<Self> {
        let input = coverage_ramp(args.width, args.height, config.adaptive.depth_far)?;
        let mut pass = DitherPass::new(config)?;
        if let Some(ref path) = args.noise_texture {
            pass.set_noise(Box::new(TextureNoise::load(path)?));
        }
        if !args.materials.is_empty() {
            pass.set_scene(args.materials.iter().map(String::as_str));
        }
        Ok(Self {
            output: DecisionBuffer::new(args.width, args.height),
            counts: vec![0; input.len()],
            pass,
            input,
        })
    }

    /// The frame pass.
    #[must_use]
    pub fn pass(&self) -> &DitherPass {
        &self.pass
    }

    /// Hot-reload : nouvelle config pour les frames suivantes.
    ///
    /// # Errors
    /// Table build failure.
    pub fn reconfigure(&mut self, config: DitherConfig) -> Result<()> {
        self.pass.set_config(config, true)
    }

    /// Run `frames` frames and accumulate per-pixel survivals.
    ///
    /// # Errors
    /// A frame failed.
    pub fn run(&mut self, frames: u32) -> Result<SimulationReport> {
        self.counts.fill(0);
        let mut survivors = 0usize;
        let mut mean_coverage = 0.0;
        for _ in 0..frames {
            let stats = self.pass.execute(&self.input, &mut self.output)?;
            survivors += stats.survivors;
            mean_coverage = stats.mean_coverage;
            for (n, s) in self.counts.iter_mut().zip(&self.output.survive) {
                *n += u32::from(*s);
            }
        }

        let total = self.input.len() as f64 * f64::from(frames);
        let mean_abs_error = self
            .counts
            .iter()
            .zip(&self.input.fragments)
            .map(|(&n, f)| (f64::from(n) / f64::from(frames) - f64::from(f.coverage)).abs())
            .sum::<f64>()
            / self.input.len() as f64;

        let report = SimulationReport {
            frames,
            survival_rate: if total > 0.0 { survivors as f64 / total } else { 0.0 },
            mean_coverage,
            mean_abs_error,
        };
        log::info!(
            "{} : {frames} frames, survie {:.4}, couverture {:.4}, erreur moyenne {:.4}",
            self.pass.mode().kind().name(),
            report.survival_rate,
            report.mean_coverage,
            report.mean_abs_error
        );
        Ok(report)
    }

    /// Accumulated survival rate as an 8-bit image.
    #[must_use]
    pub fn coverage_image(&self, frames: u32) -> GrayImage {
        let frames = frames.max(1);
        GrayImage::from_fn(self.input.width, self.input.height, |x, y| {
            let n = self.counts[(y * self.input.width + x) as usize];
            Luma([(n * 255 / frames) as u8])
        })
    }

    /// False colours of the last frame.
    #[must_use]
    pub fn debug_image(&self) -> RgbImage {
        RgbImage::from_fn(self.output.width, self.output.height, |x, y| {
            let (r, g, b) = self.output.debug[(y * self.output.width + x) as usize];
            Rgb([r, g, b])
        })
    }

    /// Write the debug view when one is active, the accumulated coverage otherwise.
    ///
    /// # Errors
    /// Image encoding or file failure.
    pub fn save_png(&self, path: &Path, frames: u32) -> Result<()> {
        let saved = if self.pass.config().adaptive_debug == AdaptiveDebugView::Off {
            self.coverage_image(frames).save(path)
        } else {
            self.debug_image().save(path)
        };
        saved.with_context(|| format!("Impossible d'écrire {}", path.display()))?;
        log::info!("Image écrite : {}", path.display());
        Ok(())
    }
}

fn print_report(report: &SimulationReport) {
    println!(
        "frames={} survival={:.4} coverage={:.4} mean_abs_error={:.4}",
        report.frames, report.survival_rate, report.mean_coverage, report.mean_abs_error
    );
}

fn run_once(sim: &mut Simulation, args: &SimulateArgs) -> Result<()> {
    let report = sim.run(args.frames)?;
    print_report(&report);
    if let Some(ref path) = args.output {
        sim.save_png(path, args.frames)?;
    }
    Ok(())
}

/// Run the simulation, then, with `--watch`, again on every config change
/// until Ctrl-C.
///
/// # Errors
/// Invalid arguments, simulation or watcher failure.
pub fn run(args: &SimulateArgs, config_path: &Path, mut config: DitherConfig) -> Result<()> {
    args.validate()?;
    args.apply(&mut config);
    let mut sim = Simulation::new(config.clone(), args)?;
    run_once(&mut sim, args)?;

    if !args.watch {
        return Ok(());
    }

    let shared = Arc::new(ArcSwap::from_pointee(config));
    let (reload_tx, reload_rx) = flume::unbounded();
    let _watcher = hotreload::spawn_config_watcher(config_path, &shared, reload_tx)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Impossible d'installer le handler Ctrl-C")?;
    log::info!("Surveillance de {} (Ctrl-C pour quitter)", config_path.display());

    while running.load(Ordering::SeqCst) {
        match reload_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) => {
                let mut config = (**shared.load()).clone();
                args.apply(&mut config);
                sim.reconfigure(config)?;
                log::info!("Nouvelle config : mode {}", sim.pass().mode().kind().name());
                run_once(&mut sim, args)?;
            }
            Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use sd_core::config::{ModeKind, SearchSettings};

    use super::*;
    use crate::cli::{Cli, Command};

    fn args(extra: &[&str]) -> SimulateArgs {
        let argv = ["sdither", "simulate"].into_iter().chain(extra.iter().copied());
        match Cli::parse_from(argv).command {
            Command::Simulate(a) => a,
            Command::Search(_) => panic!("expected simulate"),
        }
    }

    fn config(mode: ModeKind) -> DitherConfig {
        DitherConfig {
            mode,
            search: SearchSettings {
                anneal_iterations: 20_000,
                seed: Some(2),
                ..SearchSettings::default()
            },
            ..DitherConfig::default()
        }
    }

    #[test]
    fn ramp_spans_zero_to_one() {
        let ramp = coverage_ramp(5, 3, 10.0).unwrap();
        assert_eq!(ramp.get(0, 0).coverage, 0.0);
        assert_eq!(ramp.get(4, 2).coverage, 1.0);
        assert_eq!(ramp.get(0, 2).depth, Some(10.0));
    }

    #[test]
    fn reservoir_converges_on_ramp() {
        let a = args(&["--width", "64", "--height", "8", "--frames", "400"]);
        let mut sim = Simulation::new(config(ModeKind::Reservoir), &a).unwrap();
        let report = sim.run(a.frames).unwrap();
        assert!(report.mean_abs_error < 0.01, "{report:?}");
        assert!((report.survival_rate - 0.5).abs() < 0.01);
    }

    #[test]
    fn grid_rate_tracks_ramp() {
        let a = args(&["--width", "64", "--height", "16", "--frames", "32"]);
        let mut sim = Simulation::new(config(ModeKind::Grid4x4), &a).unwrap();
        let report = sim.run(a.frames).unwrap();
        assert!((report.survival_rate - report.mean_coverage).abs() < 0.05, "{report:?}");
    }

    #[test]
    fn reconfigure_switches_mode() {
        let a = args(&["--width", "16", "--height", "16", "--frames", "2"]);
        let mut sim = Simulation::new(config(ModeKind::RussianRoulette), &a).unwrap();
        sim.run(a.frames).unwrap();
        sim.reconfigure(config(ModeKind::Grid2x2)).unwrap();
        sim.run(a.frames).unwrap();
        assert_eq!(sim.pass().mode().kind(), ModeKind::Grid2x2);
        assert_eq!(sim.pass().frame_count(), 4);
    }

    #[test]
    fn writes_coverage_and_debug_png() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(&["--width", "32", "--height", "16", "--frames", "4"]);

        let mut sim = Simulation::new(config(ModeKind::Grid2x2), &a).unwrap();
        sim.run(a.frames).unwrap();
        let coverage = dir.path().join("coverage.png");
        sim.save_png(&coverage, a.frames).unwrap();
        let img = image::open(&coverage).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (32, 16));
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(31, 0)[0], 255);

        let mut debug_config = config(ModeKind::Adaptive);
        debug_config.adaptive_debug = AdaptiveDebugView::MatrixSize;
        let mut sim = Simulation::new(debug_config, &a).unwrap();
        sim.run(1).unwrap();
        let debug = dir.path().join("debug.png");
        sim.save_png(&debug, 1).unwrap();
        let img = image::open(&debug).unwrap().to_rgb8();
        assert_ne!(img.get_pixel(3, 3).0, [0, 0, 0]);
    }
}
