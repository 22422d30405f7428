use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration complète de la passe de tramage, hot-rechargeable.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use sd_core::config::{DitherConfig, ModeKind};
/// let config = DitherConfig::default();
/// assert_eq!(config.mode, ModeKind::Grid3x3);
/// assert_eq!(config.search.max_results, 288);
/// ```
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DitherConfig {
    // === Mode ===
    /// Stratégie de décision par pixel active pour la frame.
    pub mode: ModeKind,
    /// Rotation temporelle de l'entrée de table (grilles, hash grid).
    pub rotate_pattern: bool,
    /// Signal utilisé pour décorréler deux surfaces transparentes superposées.
    pub object_hash: ObjectHash,
    /// Taille de cellule du hash grid / fractal, en pixels [0.0001, 16.0].
    pub grid_scale: f32,
    /// Texture de bruit pour les modes bruit et hash grid.
    pub noise_pattern: NoisePattern,
    /// Motif fractal (taille de la matrice de Bayer récursive).
    pub fractal_pattern: FractalPattern,
    /// Nombre d'échantillons du mode per-jitter [1, 16].
    pub jitter_sample_count: u32,
    /// Permutations des masques 5-voisinage (mode temporal AA).
    pub taa_mask_permutations: bool,
    /// Bruit superposé au rang des grilles et des masques TAA.
    pub noise_top: NoiseTop,

    // === Whitelist ===
    /// Restreindre le tramage aux matériaux whitelistés (les autres font un alpha test).
    pub use_whitelist: bool,
    /// Noms des matériaux tramés.
    pub whitelist: Vec<String>,

    // === Adaptive / RIS ===
    /// Poids du mode adaptatif et du réservoir temporel.
    pub adaptive: AdaptiveWeights,
    /// Canal de visualisation debug du mode adaptatif.
    pub adaptive_debug: AdaptiveDebugView,

    // === Permutation search ===
    /// Paramètres de recherche des tables de permutation.
    pub search: SearchSettings,
}

/// Per-pixel decision strategy tag as stored in configuration.
///
/// Unknown names and out-of-range indices map to [`ModeKind::Disabled`].
///
/// # Example
/// ```
/// use sd_core::config::ModeKind;
/// assert_eq!(ModeKind::parse_lenient("RussianRoulette"), ModeKind::RussianRoulette);
/// assert_eq!(ModeKind::parse_lenient("NotAMode"), ModeKind::Disabled);
/// assert_eq!(ModeKind::from_index(999), ModeKind::Disabled);
/// ```
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum ModeKind {
    /// Opaque passthrough, every fragment survives.
    #[default]
    Disabled,
    /// 2×2 permutation grid.
    #[serde(alias = "PerPixel2x2")]
    Grid2x2,
    /// 3×3 permutation grid.
    #[serde(alias = "PerPixel3x3")]
    Grid3x3,
    /// 4×4 permutation grid (annealed table).
    #[serde(alias = "PerPixel4x4")]
    Grid4x4,
    /// Per-sample threshold ranked through the camera jitter sequence.
    PerJitter,
    /// Independent uniform draw per fragment.
    RussianRoulette,
    /// Low-discrepancy periodic pattern.
    Periodic,
    /// Hashed screen-space cells.
    HashGrid,
    /// Recursive Bayer pattern lookup.
    #[serde(alias = "FractalDithering")]
    Fractal,
    /// Threshold read from a noise texture.
    NoiseTexture,
    /// Spatio-temporal blue noise slices.
    SpatioTemporalBlueNoise,
    /// Plus-shaped 5-neighbourhood masks rotated over five frames.
    #[serde(alias = "DitherTemporalAA")]
    TemporalAa,
    /// Depth/frequency/alpha driven matrix size.
    Adaptive,
    /// Temporal reservoir resampling.
    #[serde(alias = "Ris")]
    Reservoir,
    /// 2×2×2 grid: two 2×2 slices alternating with the frame.
    #[serde(alias = "PerPixel2x2x2")]
    Grid2x2x2,
}

impl ModeKind {
    /// Every mode, in index order.
    pub const ALL: [ModeKind; 15] = [
        ModeKind::Disabled,
        ModeKind::Grid2x2,
        ModeKind::Grid3x3,
        ModeKind::Grid4x4,
        ModeKind::PerJitter,
        ModeKind::RussianRoulette,
        ModeKind::Periodic,
        ModeKind::HashGrid,
        ModeKind::Fractal,
        ModeKind::NoiseTexture,
        ModeKind::SpatioTemporalBlueNoise,
        ModeKind::TemporalAa,
        ModeKind::Adaptive,
        ModeKind::Reservoir,
        ModeKind::Grid2x2x2,
    ];

    /// Mode for a numeric index; anything unknown is `Disabled`.
    #[must_use]
    pub fn from_index(index: u32) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(ModeKind::Disabled)
    }

    /// Stable name used in TOML and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ModeKind::Disabled => "Disabled",
            ModeKind::Grid2x2 => "Grid2x2",
            ModeKind::Grid3x3 => "Grid3x3",
            ModeKind::Grid4x4 => "Grid4x4",
            ModeKind::PerJitter => "PerJitter",
            ModeKind::RussianRoulette => "RussianRoulette",
            ModeKind::Periodic => "Periodic",
            ModeKind::HashGrid => "HashGrid",
            ModeKind::Fractal => "Fractal",
            ModeKind::NoiseTexture => "NoiseTexture",
            ModeKind::SpatioTemporalBlueNoise => "SpatioTemporalBlueNoise",
            ModeKind::TemporalAa => "TemporalAa",
            ModeKind::Adaptive => "Adaptive",
            ModeKind::Reservoir => "Reservoir",
            ModeKind::Grid2x2x2 => "Grid2x2x2",
        }
    }

    /// Parse a mode name, case-insensitively, accepting the legacy aliases.
    ///
    /// Unrecognised names degrade to `Disabled` with a warning instead of
    /// failing, so older or newer config files keep loading.
    #[must_use]
    pub fn parse_lenient(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        let alias = match lower.as_str() {
            "perpixel2x2" => Some(ModeKind::Grid2x2),
            "perpixel3x3" => Some(ModeKind::Grid3x3),
            "perpixel4x4" => Some(ModeKind::Grid4x4),
            "perpixel2x2x2" => Some(ModeKind::Grid2x2x2),
            "fractaldithering" => Some(ModeKind::Fractal),
            "dithertemporalaa" | "taa" => Some(ModeKind::TemporalAa),
            "ris" => Some(ModeKind::Reservoir),
            "stbn" => Some(ModeKind::SpatioTemporalBlueNoise),
            _ => None,
        };
        if let Some(mode) = alias {
            return mode;
        }
        if let Some(mode) = Self::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(&lower))
        {
            return *mode;
        }
        log::warn!("Mode de tramage inconnu '{name}', passthrough opaque.");
        ModeKind::Disabled
    }

    /// Matrix side for the grid modes.
    #[must_use]
    pub fn grid_size(self) -> Option<usize> {
        match self {
            ModeKind::Grid2x2 => Some(2),
            ModeKind::Grid3x3 => Some(3),
            ModeKind::Grid4x4 => Some(4),
            _ => None,
        }
    }
}

/// Which identifier decorrelates the table entry between surfaces.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ObjectHash {
    /// Same entry for every surface.
    None,
    /// Hash of the instance/object id.
    #[default]
    Instance,
    /// Hash of the material id.
    Material,
    /// Hash of both ids.
    InstanceMaterial,
}

/// Bruit superposé aux modes grille et TAA.
///
/// Le rang du pixel reçoit un décalage dans [0, 1) avant la comparaison au
/// niveau de couverture, ce qui remplace l'arrondi à `N²` niveaux par un
/// tramage entre deux niveaux voisins.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum NoiseTop {
    /// Plain rounded level.
    #[default]
    #[serde(alias = "None")]
    Off,
    /// Screen-space noise texture with golden-ratio temporal offset.
    Screen,
    /// Noise hashed per surface and per `grid_scale` cell.
    SurfaceWhite,
}

/// External noise texture selection.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum NoisePattern {
    /// White noise, 1024².
    White,
    /// Blue noise, 1024².
    #[default]
    Blue,
    /// Bayer matrix texture.
    Bayer,
    /// Blue-noise-ordered Bayer levels.
    BlueBayer,
    /// Poisson disk noise.
    Poisson,
    /// Perlin value noise.
    Perlin,
    /// Blue noise, 64².
    #[serde(alias = "BlueNoise64")]
    Blue64,
}

/// Recursive Bayer pattern size used by the fractal mode.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum FractalPattern {
    /// 2×2 base pattern.
    Dither2x2,
    /// 4×4 base pattern.
    #[default]
    Dither4x4,
    /// 8×8 base pattern.
    Dither8x8,
}

impl FractalPattern {
    /// Side of the base matrix.
    #[must_use]
    pub fn side(self) -> u32 {
        match self {
            FractalPattern::Dither2x2 => 2,
            FractalPattern::Dither4x4 => 4,
            FractalPattern::Dither8x8 => 8,
        }
    }
}

/// False-colour channel emitted by the adaptive mode.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum AdaptiveDebugView {
    /// No debug output.
    #[default]
    Off,
    /// Chosen matrix size (2, 3 or 4).
    MatrixSize,
    /// Normalised depth contribution.
    Depth,
    /// Frequency contribution.
    Frequency,
    /// Alpha contribution.
    Alpha,
    /// Combined selector.
    Combined,
}

/// Scoring rule applied by the permutation search.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum ScoreRule {
    /// Torus 4-neighbour squared differences, zero on consecutive neighbours.
    #[default]
    Adjacency,
    /// Earlier all-pairs torus distance rule. Never rejects.
    TorusDistance,
}

/// Tunables for the adaptive mode and the temporal reservoir.
///
/// # Example
/// ```
/// use sd_core::config::AdaptiveWeights;
/// let w = AdaptiveWeights::default();
/// assert!(w.depth_far > 0.0);
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdaptiveWeights {
    /// Distance at which normalised depth saturates to 1.
    pub depth_far: f32,
    /// Weight of the depth term.
    pub depth_weight: f32,
    /// Weight of the texture-frequency term.
    pub frequency_weight: f32,
    /// Weight of the alpha term.
    pub alpha_weight: f32,
    /// Scale applied to the raw frequency estimate before clamping.
    pub frequency_scale: f32,
    /// Share of fragments decided by the noise texture instead of the grid [0, 1].
    pub noise_blend: f32,
    /// Down-weighting of repeating last frame's outcome [0, 1].
    pub repeat_penalty: f32,
    /// Up-weighting of the outcome not seen recently [0, 4].
    pub novelty_boost: f32,
}

impl Default for AdaptiveWeights {
    fn default() -> Self {
        Self {
            depth_far: 100.0,
            depth_weight: 0.4,
            frequency_weight: 0.4,
            alpha_weight: 0.2,
            frequency_scale: 1.0,
            noise_blend: 0.0,
            repeat_penalty: 0.5,
            novelty_boost: 0.5,
        }
    }
}

impl AdaptiveWeights {
    /// Clamp all fields to their valid ranges.
    pub fn clamp_all(&mut self) {
        self.depth_far = self.depth_far.max(1e-3);
        self.depth_weight = self.depth_weight.clamp(0.0, 10.0);
        self.frequency_weight = self.frequency_weight.clamp(0.0, 10.0);
        self.alpha_weight = self.alpha_weight.clamp(0.0, 10.0);
        self.frequency_scale = self.frequency_scale.clamp(0.0, 100.0);
        self.noise_blend = self.noise_blend.clamp(0.0, 1.0);
        self.repeat_penalty = self.repeat_penalty.clamp(0.0, 1.0);
        self.novelty_boost = self.novelty_boost.clamp(0.0, 4.0);
    }
}

/// Permutation search parameters.
///
/// `min_score`/`max_score` restrict results to a score band for exploring
/// weaker, denser patterns.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    /// Maximum number of matrices kept per table.
    pub max_results: usize,
    /// Inclusive lower score bound (None = any positive score).
    pub min_score: Option<u32>,
    /// Inclusive upper score bound (None = unbounded).
    pub max_score: Option<u32>,
    /// Annealing iterations per chain (4×4 only).
    pub anneal_iterations: u64,
    /// Starting annealing temperature.
    pub initial_temperature: f64,
    /// Geometric cooling factor per iteration.
    pub cooling_rate: f64,
    /// Independent annealing chains merged at the end.
    pub chains: usize,
    /// Base RNG seed. None = seeded from entropy.
    pub seed: Option<u64>,
    /// Scoring rule.
    pub rule: ScoreRule,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 288,
            min_score: None,
            max_score: None,
            anneal_iterations: 1_000_000,
            initial_temperature: 100.0,
            cooling_rate: 0.99999,
            chains: 4,
            seed: None,
            rule: ScoreRule::Adjacency,
        }
    }
}

impl SearchSettings {
    /// Clamp all numeric fields to their valid ranges.
    pub fn clamp_all(&mut self) {
        self.max_results = self.max_results.clamp(1, 65_536);
        self.initial_temperature = self.initial_temperature.clamp(1e-6, 1e6);
        self.cooling_rate = self.cooling_rate.clamp(0.5, 1.0);
        self.chains = self.chains.clamp(1, 64);
        if let (Some(lo), Some(hi)) = (self.min_score, self.max_score) {
            if lo > hi {
                log::warn!("Bande de score inversée [{lo}, {hi}], bornes échangées.");
                self.min_score = Some(hi);
                self.max_score = Some(lo);
            }
        }
    }
}

impl Default for DitherConfig {
    fn default() -> Self {
        Self {
            mode: ModeKind::Grid3x3,
            rotate_pattern: true,
            object_hash: ObjectHash::Instance,
            grid_scale: 1.0,
            noise_pattern: NoisePattern::Blue,
            fractal_pattern: FractalPattern::Dither4x4,
            jitter_sample_count: 16,
            taa_mask_permutations: true,
            noise_top: NoiseTop::Off,
            use_whitelist: false,
            whitelist: Vec::new(),
            adaptive: AdaptiveWeights::default(),
            adaptive_debug: AdaptiveDebugView::Off,
            search: SearchSettings::default(),
        }
    }
}

impl DitherConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.grid_scale = self.grid_scale.clamp(0.0001, 16.0);
        self.jitter_sample_count = self.jitter_sample_count.clamp(1, 16);
        self.adaptive.clamp_all();
        self.search.clamp_all();
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    dither: Option<DitherSection>,
    adaptive: Option<AdaptiveSection>,
    ris: Option<RisSection>,
    search: Option<SearchSection>,
}

/// Dither section, all fields optional for partial override.
///
/// `mode` stays a string (or index) so unknown values degrade instead of failing the parse.
#[derive(Deserialize)]
struct DitherSection {
    mode: Option<ModeValue>,
    rotate_pattern: Option<bool>,
    object_hash: Option<ObjectHash>,
    grid_scale: Option<f32>,
    noise_pattern: Option<NoisePattern>,
    fractal_pattern: Option<FractalPattern>,
    jitter_sample_count: Option<u32>,
    taa_mask_permutations: Option<bool>,
    noise_top: Option<NoiseTop>,
    use_whitelist: Option<bool>,
    whitelist: Option<WhitelistValue>,
    adaptive_debug: Option<AdaptiveDebugView>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeValue {
    Index(u32),
    Name(String),
}

/// Whitelist as a TOML array or as the comma-separated property string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WhitelistValue {
    List(Vec<String>),
    Joined(String),
}

#[derive(Deserialize)]
struct AdaptiveSection {
    depth_far: Option<f32>,
    depth_weight: Option<f32>,
    frequency_weight: Option<f32>,
    alpha_weight: Option<f32>,
    frequency_scale: Option<f32>,
    noise_blend: Option<f32>,
}

#[derive(Deserialize)]
struct RisSection {
    repeat_penalty: Option<f32>,
    novelty_boost: Option<f32>,
}

#[derive(Deserialize)]
struct SearchSection {
    max_results: Option<usize>,
    min_score: Option<u32>,
    max_score: Option<u32>,
    anneal_iterations: Option<u64>,
    initial_temperature: Option<f64>,
    cooling_rate: Option<f64>,
    chains: Option<usize>,
    seed: Option<u64>,
    rule: Option<ScoreRule>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use sd_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<DitherConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for the config schema.
///
/// # Example
/// ```
/// use sd_core::config::{parse_config, ModeKind};
/// let config = parse_config("[dither]\nmode = \"Reservoir\"\n").unwrap();
/// assert_eq!(config.mode, ModeKind::Reservoir);
/// ```
pub fn parse_config(content: &str) -> Result<DitherConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    let mut config = DitherConfig::default();

    if let Some(d) = file.dither {
        if let Some(v) = d.mode {
            config.mode = match v {
                ModeValue::Index(i) => {
                    let mode = ModeKind::from_index(i);
                    if mode == ModeKind::Disabled && i != 0 {
                        log::warn!("Index de mode {i} hors plage, passthrough opaque.");
                    }
                    mode
                }
                ModeValue::Name(name) => ModeKind::parse_lenient(&name),
            };
        }
        if let Some(v) = d.rotate_pattern {
            config.rotate_pattern = v;
        }
        if let Some(v) = d.object_hash {
            config.object_hash = v;
        }
        if let Some(v) = d.grid_scale {
            config.grid_scale = v;
        }
        if let Some(v) = d.noise_pattern {
            config.noise_pattern = v;
        }
        if let Some(v) = d.fractal_pattern {
            config.fractal_pattern = v;
        }
        if let Some(v) = d.jitter_sample_count {
            config.jitter_sample_count = v;
        }
        if let Some(v) = d.taa_mask_permutations {
            config.taa_mask_permutations = v;
        }
        if let Some(v) = d.noise_top {
            config.noise_top = v;
        }
        if let Some(v) = d.use_whitelist {
            config.use_whitelist = v;
        }
        if let Some(v) = d.whitelist {
            config.whitelist = match v {
                WhitelistValue::List(list) => list,
                WhitelistValue::Joined(joined) => crate::whitelist::split_names(&joined),
            };
        }
        if let Some(v) = d.adaptive_debug {
            config.adaptive_debug = v;
        }
    }

    if let Some(a) = file.adaptive {
        if let Some(v) = a.depth_far {
            config.adaptive.depth_far = v;
        }
        if let Some(v) = a.depth_weight {
            config.adaptive.depth_weight = v;
        }
        if let Some(v) = a.frequency_weight {
            config.adaptive.frequency_weight = v;
        }
        if let Some(v) = a.alpha_weight {
            config.adaptive.alpha_weight = v;
        }
        if let Some(v) = a.frequency_scale {
            config.adaptive.frequency_scale = v;
        }
        if let Some(v) = a.noise_blend {
            config.adaptive.noise_blend = v;
        }
    }

    if let Some(r) = file.ris {
        if let Some(v) = r.repeat_penalty {
            config.adaptive.repeat_penalty = v;
        }
        if let Some(v) = r.novelty_boost {
            config.adaptive.novelty_boost = v;
        }
    }

    if let Some(s) = file.search {
        if let Some(v) = s.max_results {
            config.search.max_results = v;
        }
        if s.min_score.is_some() {
            config.search.min_score = s.min_score;
        }
        if s.max_score.is_some() {
            config.search.max_score = s.max_score;
        }
        if let Some(v) = s.anneal_iterations {
            config.search.anneal_iterations = v;
        }
        if let Some(v) = s.initial_temperature {
            config.search.initial_temperature = v;
        }
        if let Some(v) = s.cooling_rate {
            config.search.cooling_rate = v;
        }
        if let Some(v) = s.chains {
            config.search.chains = v;
        }
        if s.seed.is_some() {
            config.search.seed = s.seed;
        }
        if let Some(v) = s.rule {
            config.search.rule = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, DitherConfig::default());
    }

    #[test]
    fn unknown_mode_name_is_disabled() {
        let config = parse_config("[dither]\nmode = \"Hologram\"\n").unwrap();
        assert_eq!(config.mode, ModeKind::Disabled);
    }

    #[test]
    fn numeric_mode_index_maps_and_out_of_range_disables() {
        let config = parse_config("[dither]\nmode = 5\n").unwrap();
        assert_eq!(config.mode, ModeKind::RussianRoulette);
        let config = parse_config("[dither]\nmode = 77\n").unwrap();
        assert_eq!(config.mode, ModeKind::Disabled);
    }

    #[test]
    fn legacy_aliases_are_accepted() {
        assert_eq!(ModeKind::parse_lenient("PerPixel4x4"), ModeKind::Grid4x4);
        assert_eq!(ModeKind::parse_lenient("ditherTemporalAA"), ModeKind::TemporalAa);
        assert_eq!(ModeKind::parse_lenient("ris"), ModeKind::Reservoir);
    }

    #[test]
    fn whitelist_accepts_joined_string() {
        let config =
            parse_config("[dither]\nuse_whitelist = true\nwhitelist = \"Leaves,Glass,\"\n").unwrap();
        assert!(config.use_whitelist);
        assert_eq!(config.whitelist, vec!["Leaves".to_string(), "Glass".to_string()]);
    }

    #[test]
    fn values_are_clamped() {
        let text = "[dither]\njitter_sample_count = 64\n[ris]\nrepeat_penalty = 3.0\n[search]\nmin_score = 900\nmax_score = 100\n";
        let config = parse_config(text).unwrap();
        assert_eq!(config.jitter_sample_count, 16);
        assert!((config.adaptive.repeat_penalty - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.search.min_score, Some(100));
        assert_eq!(config.search.max_score, Some(900));
    }

    #[test]
    fn load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dither]\nmode = \"Adaptive\"\n[adaptive]\nnoise_blend = 0.25").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.mode, ModeKind::Adaptive);
        assert!((config.adaptive.noise_blend - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn load_config_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn temporal_grid_and_noise_top_parse() {
        let config = parse_config("[dither]\nmode = \"PerPixel2x2x2\"\nnoise_top = \"SurfaceWhite\"\n").unwrap();
        assert_eq!(config.mode, ModeKind::Grid2x2x2);
        assert_eq!(config.noise_top, NoiseTop::SurfaceWhite);
        assert_eq!(ModeKind::from_index(14), ModeKind::Grid2x2x2);
        assert_eq!(ModeKind::from_index(12), ModeKind::Adaptive);
        assert_eq!(DitherConfig::default().noise_top, NoiseTop::Off);
    }

    #[test]
    fn mode_index_round_trip() {
        for (i, mode) in ModeKind::ALL.iter().enumerate() {
            assert_eq!(ModeKind::from_index(i as u32), *mode);
            assert_eq!(ModeKind::parse_lenient(mode.name()), *mode);
        }
    }
}
