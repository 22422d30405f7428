use rayon::prelude::*;
use sd_core::DitherError;
use sd_core::config::{ScoreRule, SearchSettings};

use super::{ScoreBand, Scored, TopK};
use crate::matrix::{PermutationMatrix, check_side};
use crate::score::score_with;

/// Paramètres du recuit simulé.
///
/// # Example
/// ```
/// use sd_perm::search::AnnealParams;
/// let p = AnnealParams { iterations: 0, ..AnnealParams::default() };
/// assert_eq!(p.iterations, 0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AnnealParams {
    /// Swap attempts per chain.
    pub iterations: u64,
    /// Starting temperature.
    pub initial_temperature: f64,
    /// `temperature *= cooling_rate` after every attempt.
    pub cooling_rate: f64,
    /// Independent chains, run in parallel and merged.
    pub chains: usize,
    /// Base seed; chain `i` uses a seed derived from it.
    pub seed: u64,
    /// Scoring rule.
    pub rule: ScoreRule,
    /// Accepted score band.
    pub band: ScoreBand,
    /// Best-K cap.
    pub max_results: usize,
}

impl Default for AnnealParams {
    fn default() -> Self {
        Self::from_settings(&SearchSettings {
            seed: Some(0x5EED_D17E),
            ..SearchSettings::default()
        })
    }
}

impl AnnealParams {
    /// Derive parameters from the configuration. A missing seed is drawn from entropy and logged.
    #[must_use]
    pub fn from_settings(settings: &SearchSettings) -> Self {
        let seed = settings.seed.unwrap_or_else(|| {
            let s = fastrand::u64(..);
            log::info!("Graine du recuit tirée : {s:#018x}");
            s
        });
        Self {
            iterations: settings.anneal_iterations,
            initial_temperature: settings.initial_temperature,
            cooling_rate: settings.cooling_rate,
            chains: settings.chains.max(1),
            seed,
            rule: settings.rule,
            band: ScoreBand::new(settings.min_score, settings.max_score),
            max_results: settings.max_results,
        }
    }
}

/// Recuit simulé depuis la graine (Bayer 4×4 pour N = 4).
///
/// À chaque itération deux cellules tirées au hasard sont échangées. Un coup
/// qui améliore est toujours accepté, un coup qui dégrade l'est avec la
/// probabilité `exp((nouveau - ancien) / T)`. Tout candidat évalué dont le
/// score est dans la bande est retenu, accepté ou non (dédupliqué, top-K borné).
///
/// Si rien de positif n'est trouvé, retourne exactement la graine.
///
/// # Errors
/// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
///
/// # Example
/// ```
/// use sd_perm::matrix::PermutationMatrix;
/// use sd_perm::search::{AnnealParams, search_annealed};
/// let p = AnnealParams { iterations: 0, ..AnnealParams::default() };
/// let out = search_annealed(4, &p).unwrap();
/// assert_eq!(out.len(), 1);
/// assert_eq!(out[0].matrix, PermutationMatrix::seed(4).unwrap());
/// ```
pub fn search_annealed(n: usize, params: &AnnealParams) -> Result<Vec<Scored>, DitherError> {
    check_side(n)?;
    let seed_matrix = PermutationMatrix::seed(n)?;

    let merged = (0..params.chains.max(1))
        .into_par_iter()
        .map(|chain| run_chain(seed_matrix, params, chain_seed(params.seed, chain)))
        .reduce(
            || TopK::new(params.max_results),
            |mut acc, part| {
                acc.extend(part.into_sorted());
                acc
            },
        );

    let ranked = merged.into_sorted();
    if ranked.is_empty() {
        return super::seed_fallback(n, params.rule);
    }
    Ok(ranked)
}

/// SplitMix64 step so neighbouring chain indices get unrelated streams.
fn chain_seed(base: u64, chain: usize) -> u64 {
    let mut z = base.wrapping_add((chain as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn run_chain(start: PermutationMatrix, params: &AnnealParams, seed: u64) -> TopK {
    let mut rng = fastrand::Rng::with_seed(seed);
    let cells = start.n() * start.n();
    let mut top = TopK::new(params.max_results);

    let mut current = start;
    let mut current_score = score_with(params.rule, &current);
    if params.band.accepts(current_score) {
        top.offer(Scored {
            score: current_score,
            matrix: current,
        });
    }

    let mut temperature = params.initial_temperature.max(f64::MIN_POSITIVE);
    let mut accepted = 0u64;

    for _ in 0..params.iterations {
        let a = rng.usize(0..cells);
        let mut b = rng.usize(0..cells - 1);
        if b >= a {
            b += 1;
        }

        let mut candidate = current;
        candidate.swap(a, b);
        let candidate_score = score_with(params.rule, &candidate);
        if params.band.accepts(candidate_score) {
            top.offer(Scored {
                score: candidate_score,
                matrix: candidate,
            });
        }

        let delta = f64::from(candidate_score) - f64::from(current_score);
        if delta >= 0.0 || rng.f64() < (delta / temperature).exp() {
            current = candidate;
            current_score = candidate_score;
            accepted += 1;
        }

        temperature = (temperature * params.cooling_rate).max(f64::MIN_POSITIVE);
    }

    log::debug!(
        "Chaîne de recuit {seed:#x} : {accepted}/{} coups acceptés, T final {temperature:.3e}",
        params.iterations
    );
    top
}
