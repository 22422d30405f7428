use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sd_core::DitherConfig;
use sd_core::config::{AdaptiveDebugView, ModeKind, ScoreRule, SearchSettings};

/// sdither — recherche de matrices de permutation et tramage stochastique.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cherche les meilleures matrices N×N et affiche la table.
    Search(SearchArgs),
    /// Exécute la passe de tramage sur une rampe de couverture synthétique.
    Simulate(SimulateArgs),
}

/// Format de sortie de `search`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Matrices en grille avec leur score.
    Text,
    /// Mots 32 bits empaquetés, un par ligne.
    Hex,
    /// Table complète en JSON.
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleArg {
    Adjacency,
    Torus,
}

impl From<RuleArg> for ScoreRule {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::Adjacency => ScoreRule::Adjacency,
            RuleArg::Torus => ScoreRule::TorusDistance,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Côté de la matrice (2, 3 ou 4).
    #[arg(short = 'n', long, default_value_t = 4)]
    pub size: usize,

    /// Nombre maximal de matrices gardées.
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Score minimal accepté (inclus).
    #[arg(long)]
    pub min_score: Option<u32>,

    /// Score maximal accepté (inclus).
    #[arg(long)]
    pub max_score: Option<u32>,

    /// Itérations de recuit par chaîne (4×4).
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Chaînes de recuit parallèles.
    #[arg(long)]
    pub chains: Option<usize>,

    /// Graine du recuit (aléatoire si absente).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Règle de score.
    #[arg(long, value_enum)]
    pub rule: Option<RuleArg>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Cache bincode de la table, relu si les paramètres sont identiques.
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Écrire dans un fichier plutôt que sur stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SearchArgs {
    /// Apply the command-line overrides to the configured settings.
    pub fn apply(&self, settings: &mut SearchSettings) {
        if let Some(v) = self.max_results {
            settings.max_results = v;
        }
        if self.min_score.is_some() {
            settings.min_score = self.min_score;
        }
        if self.max_score.is_some() {
            settings.max_score = self.max_score;
        }
        if let Some(v) = self.iterations {
            settings.anneal_iterations = v;
        }
        if let Some(v) = self.chains {
            settings.chains = v;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if let Some(rule) = self.rule {
            settings.rule = rule.into();
        }
        settings.clamp_all();
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Mode de tramage (nom ou index), remplace celui de la config.
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Largeur de la rampe ; la couverture va de 0 à 1 de gauche à droite.
    #[arg(long, default_value_t = 256)]
    pub width: u32,

    /// Hauteur ; la profondeur croît de haut en bas.
    #[arg(long, default_value_t = 64)]
    pub height: u32,

    /// Nombre de frames accumulées.
    #[arg(short, long, default_value_t = 16)]
    pub frames: u32,

    /// Texture de bruit PNG pour les modes à seuil de bruit.
    #[arg(long)]
    pub noise_texture: Option<PathBuf>,

    /// Matériaux de la scène, dans l'ordre des identifiants.
    #[arg(long, value_delimiter = ',')]
    pub materials: Vec<String>,

    /// PNG de la couverture accumulée (ou de la vue de debug adaptative).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Vue de debug du mode adaptatif écrite à la place de la couverture.
    #[arg(long, value_enum)]
    pub debug_view: Option<DebugViewArg>,

    /// Relancer la simulation à chaque modification de la config.
    #[arg(long, default_value_t = false)]
    pub watch: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugViewArg {
    Size,
    Depth,
    Frequency,
    Alpha,
    Combined,
}

impl From<DebugViewArg> for AdaptiveDebugView {
    fn from(view: DebugViewArg) -> Self {
        match view {
            DebugViewArg::Size => AdaptiveDebugView::MatrixSize,
            DebugViewArg::Depth => AdaptiveDebugView::Depth,
            DebugViewArg::Frequency => AdaptiveDebugView::Frequency,
            DebugViewArg::Alpha => AdaptiveDebugView::Alpha,
            DebugViewArg::Combined => AdaptiveDebugView::Combined,
        }
    }
}

impl SimulateArgs {
    /// Apply the command-line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut DitherConfig) {
        if let Some(ref mode) = self.mode {
            config.mode = match mode.parse::<u32>() {
                Ok(index) => ModeKind::from_index(index),
                Err(_) => ModeKind::parse_lenient(mode),
            };
        }
        if let Some(view) = self.debug_view {
            config.adaptive_debug = view.into();
        }
    }

    /// Validate the simulation dimensions.
    ///
    /// # Errors
    /// Returns an error if a dimension or the frame count is zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("Dimensions de simulation nulles : {}x{}", self.width, self.height);
        }
        if self.frames == 0 {
            anyhow::bail!("Au moins une frame est nécessaire.");
        }
        Ok(())
    }
}
