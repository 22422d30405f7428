//! Stratégie de décision active pour une frame.
//!
//! [`ModeKind`] est l'étiquette stockée en configuration ; [`DitherMode`] la
//! porte avec les paramètres dont la stratégie a besoin, figés pour la frame.

use sd_core::DitherConfig;
use sd_core::config::{AdaptiveDebugView, AdaptiveWeights, FractalPattern, ModeKind, NoiseTop, ObjectHash};

use crate::ris::RisParams;

/// Bruit superposé au rang d'une grille ou d'un masque TAA.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseTopMode {
    /// Noise source of the rank offset.
    pub pattern: NoiseTop,
    /// Cell size in pixels for [`NoiseTop::SurfaceWhite`].
    pub scale: f32,
}

impl NoiseTopMode {
    /// No offset: plain rounded levels.
    pub const OFF: Self = Self {
        pattern: NoiseTop::Off,
        scale: 1.0,
    };

    fn from_config(config: &DitherConfig) -> Self {
        Self {
            pattern: config.noise_top,
            scale: config.grid_scale,
        }
    }
}

/// Grille de permutation N×N.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridMode {
    /// Matrix side (2, 3 or 4).
    pub n: usize,
    /// Advance the table entry every frame.
    pub rotate: bool,
    /// Decorrelation signal between surfaces.
    pub object_hash: ObjectHash,
    /// Rank offset layered on the grid.
    pub noise_top: NoiseTopMode,
}

/// Grille temporelle 2×2×2 : deux tranches 2×2 alternées avec la frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid3dMode {
    /// Decorrelation signal, shifts the slice phase between surfaces.
    pub object_hash: ObjectHash,
    /// Rank offset layered on the grid.
    pub noise_top: NoiseTopMode,
}

/// Seuil par échantillon de jitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JitterMode {
    /// Samples in the jitter sequence (1..=16).
    pub sample_count: u32,
}

/// Cellules d'écran hachées.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HashGridMode {
    /// Cell size in pixels.
    pub scale: f32,
    /// Golden-ratio temporal offset.
    pub rotate: bool,
    /// Decorrelation signal between surfaces.
    pub object_hash: ObjectHash,
}

/// Bayer récursif.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalMode {
    /// Base Bayer matrix.
    pub pattern: FractalPattern,
    /// Pixels per pattern cell.
    pub scale: f32,
}

/// Masques 5-voisinage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaaMode {
    /// Remap classes through one of the 120 permutations of [0..5).
    pub permutations: bool,
    /// Signal choosing the permutation.
    pub object_hash: ObjectHash,
    /// Rank offset layered on the masks.
    pub noise_top: NoiseTopMode,
}

/// Taille de matrice pilotée par profondeur, fréquence et alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveMode {
    /// Selector weights.
    pub weights: AdaptiveWeights,
    /// False-colour channel.
    pub debug: AdaptiveDebugView,
    /// Decorrelation signal for the grid lookups.
    pub object_hash: ObjectHash,
}

/// Une stratégie de décision par pixel, exactement une par évaluation.
///
/// # Example
/// ```
/// use sd_core::DitherConfig;
/// use sd_core::config::ModeKind;
/// use sd_dither::mode::DitherMode;
/// let config = DitherConfig { mode: ModeKind::Grid4x4, ..DitherConfig::default() };
/// let mode = DitherMode::from_config(&config);
/// assert_eq!(mode.kind(), ModeKind::Grid4x4);
/// assert_eq!(mode.table_sizes(), &[4]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DitherMode {
    /// Every fragment survives.
    Disabled,
    /// Permutation grid.
    Grid(GridMode),
    /// Per-sample threshold.
    PerJitter(JitterMode),
    /// Independent draw per fragment.
    RussianRoulette,
    /// R2 low-discrepancy threshold.
    Periodic,
    /// Hashed screen cells.
    HashGrid(HashGridMode),
    /// Recursive Bayer lookup.
    Fractal(FractalMode),
    /// Noise texture threshold with golden-ratio temporal offset.
    NoiseTexture,
    /// Per-frame blue noise slice.
    SpatioTemporalBlueNoise,
    /// Plus-shaped 5-neighbourhood masks.
    TemporalAa(TaaMode),
    /// Depth/frequency/alpha driven matrix size.
    Adaptive(AdaptiveMode),
    /// Temporal reservoir resampling.
    Reservoir(RisParams),
    /// Temporal 2×2×2 grid.
    Grid2x2x2(Grid3dMode),
}

impl DitherMode {
    /// Freeze the configured mode and its parameters.
    #[must_use]
    pub fn from_config(config: &DitherConfig) -> Self {
        match config.mode {
            ModeKind::Disabled => DitherMode::Disabled,
            ModeKind::Grid2x2 | ModeKind::Grid3x3 | ModeKind::Grid4x4 => {
                DitherMode::Grid(GridMode {
                    n: config.mode.grid_size().unwrap_or(3),
                    rotate: config.rotate_pattern,
                    object_hash: config.object_hash,
                    noise_top: NoiseTopMode::from_config(config),
                })
            }
            ModeKind::PerJitter => DitherMode::PerJitter(JitterMode {
                sample_count: config.jitter_sample_count.clamp(1, 16),
            }),
            ModeKind::RussianRoulette => DitherMode::RussianRoulette,
            ModeKind::Periodic => DitherMode::Periodic,
            ModeKind::HashGrid => DitherMode::HashGrid(HashGridMode {
                scale: config.grid_scale,
                rotate: config.rotate_pattern,
                object_hash: config.object_hash,
            }),
            ModeKind::Fractal => DitherMode::Fractal(FractalMode {
                pattern: config.fractal_pattern,
                scale: config.grid_scale,
            }),
            ModeKind::NoiseTexture => DitherMode::NoiseTexture,
            ModeKind::SpatioTemporalBlueNoise => DitherMode::SpatioTemporalBlueNoise,
            ModeKind::TemporalAa => DitherMode::TemporalAa(TaaMode {
                permutations: config.taa_mask_permutations,
                object_hash: config.object_hash,
                noise_top: NoiseTopMode::from_config(config),
            }),
            ModeKind::Adaptive => DitherMode::Adaptive(AdaptiveMode {
                weights: config.adaptive,
                debug: config.adaptive_debug,
                object_hash: config.object_hash,
            }),
            ModeKind::Reservoir => DitherMode::Reservoir(RisParams::from_weights(&config.adaptive)),
            ModeKind::Grid2x2x2 => DitherMode::Grid2x2x2(Grid3dMode {
                object_hash: config.object_hash,
                noise_top: NoiseTopMode::from_config(config),
            }),
        }
    }

    /// Configuration tag of this mode.
    #[must_use]
    pub fn kind(&self) -> ModeKind {
        match self {
            DitherMode::Disabled => ModeKind::Disabled,
            DitherMode::Grid(g) => match g.n {
                2 => ModeKind::Grid2x2,
                4 => ModeKind::Grid4x4,
                _ => ModeKind::Grid3x3,
            },
            DitherMode::PerJitter(_) => ModeKind::PerJitter,
            DitherMode::RussianRoulette => ModeKind::RussianRoulette,
            DitherMode::Periodic => ModeKind::Periodic,
            DitherMode::HashGrid(_) => ModeKind::HashGrid,
            DitherMode::Fractal(_) => ModeKind::Fractal,
            DitherMode::NoiseTexture => ModeKind::NoiseTexture,
            DitherMode::SpatioTemporalBlueNoise => ModeKind::SpatioTemporalBlueNoise,
            DitherMode::TemporalAa(_) => ModeKind::TemporalAa,
            DitherMode::Adaptive(_) => ModeKind::Adaptive,
            DitherMode::Reservoir(_) => ModeKind::Reservoir,
            DitherMode::Grid2x2x2(_) => ModeKind::Grid2x2x2,
        }
    }

    /// Matrix sides whose permutation tables this mode reads.
    #[must_use]
    pub fn table_sizes(&self) -> &'static [usize] {
        match self {
            DitherMode::Grid(g) => match g.n {
                2 => &[2],
                4 => &[4],
                _ => &[3],
            },
            DitherMode::Adaptive(_) => &[2, 3, 4],
            _ => &[],
        }
    }

    /// `true` if the mode reads and writes the temporal reservoir.
    #[must_use]
    pub fn uses_reservoir(&self) -> bool {
        matches!(self, DitherMode::Reservoir(_))
    }
}
