//! Décision par fragment : le mode de la frame appliqué à un pixel.
//!
//! Aucune décision ne lit celle d'un autre pixel ; le seul état est
//! l'historique du réservoir, lu dans le buffer de la frame précédente.

use sd_core::config::{NoiseTop, ObjectHash};
use sd_core::{Fragment, MaterialWhitelist, PixelKey};
use sd_perm::matrix::{BAYER_2X2, BAYER_4X4, BAYER_8X8};

use crate::adaptive::{AdaptiveSample, debug_colour};
use crate::grid::{TableSet, grid_decide_with, grid3d_rank, rank_survives};
use crate::hash::{GOLDEN_CONJUGATE, R2_ALPHA, fract, hash2, hash4, object_signal, uniform};
use crate::jitter::jitter_decide;
use crate::mode::{AdaptiveMode, DitherMode, FractalMode, Grid3dMode, GridMode, HashGridMode, NoiseTopMode};
use crate::noise::{NoiseSource, STBN_SLICES};
use crate::reservoir::ReservoirRecord;
use crate::ris::ris_step;
use crate::taa::{TAA_CLASSES, taa_rank};

/// Seuil d'alpha test des matériaux hors whitelist.
pub const ALPHA_TEST_THRESHOLD: f32 = 0.5;

// Distinct salts so the draws of one fragment are independent.
const SALT_ROULETTE: u32 = 0x3c6e_f372;
const SALT_RIS: u32 = 0x1b87_3593;
const SALT_ADAPTIVE_SIZE: u32 = 0x2c1b_3c6d;
const SALT_ADAPTIVE_BLEND: u32 = 0x297a_2d39;

/// Résultat d'une évaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DitherDecision {
    /// The fragment is kept this frame.
    pub survive: bool,
    /// False colour from the adaptive debug view.
    pub debug: Option<(u8, u8, u8)>,
    /// Reservoir record to write (reservoir mode only).
    pub record: Option<ReservoirRecord>,
}

impl DitherDecision {
    fn plain(survive: bool) -> Self {
        Self {
            survive,
            ..Self::default()
        }
    }
}

/// Tout ce qu'une décision peut lire, emprunté pour la durée de la frame.
#[derive(Clone, Copy)]
pub struct DitherPolicy<'a> {
    /// Frozen mode of the frame.
    pub mode: &'a DitherMode,
    /// Permutation tables for the grid and adaptive modes.
    pub tables: &'a TableSet,
    /// Threshold texture for the noise-based modes.
    pub noise: &'a dyn NoiseSource,
    /// Active material whitelist, `None` when disabled.
    pub whitelist: Option<&'a MaterialWhitelist>,
}

impl DitherPolicy<'_> {
    /// Évalue un fragment.
    ///
    /// La couverture est ramenée dans [0, 1] (NaN → 0). `history` est
    /// l'enregistrement de la frame précédente, `None` s'il n'est pas valide.
    ///
    /// # Example
    /// ```
    /// use sd_core::{Fragment, PixelKey};
    /// use sd_core::config::NoisePattern;
    /// use sd_dither::grid::TableSet;
    /// use sd_dither::mode::DitherMode;
    /// use sd_dither::noise::ProceduralNoise;
    /// use sd_dither::policy::DitherPolicy;
    ///
    /// let tables = TableSet::default();
    /// let noise = ProceduralNoise::new(NoisePattern::Blue, 0);
    /// let policy = DitherPolicy { mode: &DitherMode::Disabled, tables: &tables, noise: &noise, whitelist: None };
    /// let d = policy.evaluate(PixelKey::new(1, 2, 3), &Fragment::with_coverage(0.0), None);
    /// assert!(d.survive);
    /// ```
    #[must_use]
    pub fn evaluate(&self, key: PixelKey, fragment: &Fragment, history: Option<ReservoirRecord>) -> DitherDecision {
        let c = if fragment.coverage.is_nan() {
            0.0
        } else {
            fragment.coverage.clamp(0.0, 1.0)
        };

        if self.whitelist.is_some_and(|wl| !wl.contains(fragment.material_id)) {
            return DitherDecision::plain(c >= ALPHA_TEST_THRESHOLD);
        }

        let PixelKey { x, y, frame } = key;
        match self.mode {
            DitherMode::Disabled => DitherDecision::plain(true),
            DitherMode::Grid(g) => DitherDecision::plain(self.grid(g, key, fragment, c)),
            DitherMode::PerJitter(j) => DitherDecision::plain(jitter_decide(x, y, frame, c, j.sample_count)),
            DitherMode::RussianRoulette => {
                let u = uniform(hash4(x, y, frame, fragment.object_id ^ SALT_ROULETTE));
                DitherDecision::plain(u < c)
            }
            DitherMode::Periodic => {
                let t = fract(0.5 + x as f32 * R2_ALPHA.0 + y as f32 * R2_ALPHA.1 + frame as f32 * GOLDEN_CONJUGATE);
                DitherDecision::plain(t < c)
            }
            DitherMode::HashGrid(h) => DitherDecision::plain(self.hash_grid(h, key, fragment, c)),
            DitherMode::Fractal(f) => DitherDecision::plain(self.fractal(f, key, c)),
            DitherMode::NoiseTexture => DitherDecision::plain(self.noise_threshold(key) < c),
            DitherMode::SpatioTemporalBlueNoise => {
                DitherDecision::plain(self.noise.sample_slice(x, y, frame % STBN_SLICES) < c)
            }
            DitherMode::TemporalAa(t) => {
                let signal = object_signal(t.object_hash, fragment.object_id, fragment.material_id);
                let rank = taa_rank(x, y, frame, t.permutations, signal);
                let offset = self.noise_top(t.noise_top, key, fragment);
                DitherDecision::plain(rank_survives(rank, TAA_CLASSES, c, offset))
            }
            DitherMode::Grid2x2x2(g) => DitherDecision::plain(self.grid3d(g, key, fragment, c)),
            DitherMode::Adaptive(a) => self.adaptive(a, key, fragment, c),
            DitherMode::Reservoir(params) => {
                let u = uniform(hash4(x, y, frame, fragment.object_id ^ SALT_RIS));
                let record = ris_step(c, u, history, params);
                DitherDecision {
                    survive: record.outcome,
                    debug: None,
                    record: Some(record),
                }
            }
        }
    }

    #[inline]
    fn entry_index(rotate: bool, object_hash: ObjectHash, key: PixelKey, fragment: &Fragment) -> u32 {
        let base = if rotate { key.frame } else { 0 };
        base.wrapping_add(object_signal(object_hash, fragment.object_id, fragment.material_id))
    }

    fn grid(&self, g: &GridMode, key: PixelKey, fragment: &Fragment, c: f32) -> bool {
        match self.tables.get(g.n) {
            Some(table) => {
                let entry = Self::entry_index(g.rotate, g.object_hash, key, fragment);
                let offset = self.noise_top(g.noise_top, key, fragment);
                grid_decide_with(table, entry, key.x, key.y, c, offset)
            }
            // Table not built yet: fall back to the noise threshold.
            None => self.noise_threshold(key) < c,
        }
    }

    /// Tranche temporelle décalée par le signal de surface.
    fn grid3d(&self, g: &Grid3dMode, key: PixelKey, fragment: &Fragment, c: f32) -> bool {
        let signal = object_signal(g.object_hash, fragment.object_id, fragment.material_id);
        let rank = grid3d_rank(key.x, key.y, key.frame.wrapping_add(signal));
        rank_survives(rank, 8, c, self.noise_top(g.noise_top, key, fragment))
    }

    /// Décalage de rang du bruit superposé, `None` si désactivé.
    fn noise_top(&self, top: NoiseTopMode, key: PixelKey, fragment: &Fragment) -> Option<f32> {
        match top.pattern {
            NoiseTop::Off => None,
            NoiseTop::Screen => Some(self.noise_threshold(key)),
            NoiseTop::SurfaceWhite => {
                let scale = top.scale.max(1e-4);
                let cx = (key.x as f32 / scale).floor() as u32;
                let cy = (key.y as f32 / scale).floor() as u32;
                let surface = object_signal(ObjectHash::InstanceMaterial, fragment.object_id, fragment.material_id);
                let h = hash2(cx, cy) ^ surface;
                let t = self.noise.sample(h & 0xFFFF, h >> 16);
                Some(fract(t + key.frame as f32 * GOLDEN_CONJUGATE))
            }
        }
    }

    fn hash_grid(&self, h: &HashGridMode, key: PixelKey, fragment: &Fragment, c: f32) -> bool {
        let scale = h.scale.max(1e-4);
        let cx = (key.x as f32 / scale).floor() as u32;
        let cy = (key.y as f32 / scale).floor() as u32;
        let cell = hash2(cx, cy) ^ object_signal(h.object_hash, fragment.object_id, fragment.material_id);
        let mut t = self.noise.sample(cell & 0xFFFF, cell >> 16);
        if h.rotate {
            t = fract(t + key.frame as f32 * GOLDEN_CONJUGATE);
        }
        t < c
    }

    /// Rang de Bayer de la cellule plus un jitter de bruit, sur s² niveaux.
    fn fractal(&self, f: &FractalMode, key: PixelKey, c: f32) -> bool {
        let scale = f.scale.max(1e-4);
        let bx = (key.x as f32 / scale).floor() as u32;
        let by = (key.y as f32 / scale).floor() as u32;
        let side = f.pattern.side();
        let (ix, iy) = ((bx % side) as usize, (by % side) as usize);
        let rank = match side {
            2 => BAYER_2X2[iy][ix],
            4 => BAYER_4X4[iy][ix],
            _ => BAYER_8X8[iy][ix],
        };
        let jitter = self.noise.sample_slice(key.x, key.y, key.frame % STBN_SLICES);
        (f32::from(rank) + jitter) / ((side * side) as f32) < c
    }

    #[inline]
    fn noise_threshold(&self, key: PixelKey) -> f32 {
        fract(self.noise.sample(key.x, key.y) + key.frame as f32 * GOLDEN_CONJUGATE)
    }

    fn adaptive(&self, a: &AdaptiveMode, key: PixelKey, fragment: &Fragment, c: f32) -> DitherDecision {
        let PixelKey { x, y, frame } = key;
        let sample = AdaptiveSample::evaluate(&a.weights, fragment);
        let size = sample.pick_size(uniform(hash4(x, y, frame, SALT_ADAPTIVE_SIZE)));

        let blend = uniform(hash4(x, y, frame, SALT_ADAPTIVE_BLEND));
        let survive = if blend < a.weights.noise_blend {
            self.noise_threshold(key) < c
        } else {
            let grid = GridMode {
                n: size,
                rotate: true,
                object_hash: a.object_hash,
                noise_top: NoiseTopMode::OFF,
            };
            self.grid(&grid, key, fragment, c)
        };

        DitherDecision {
            survive,
            debug: debug_colour(a.debug, &sample, size),
            record: None,
        }
    }
}
