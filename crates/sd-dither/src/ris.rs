//! Un pas de rééchantillonnage temporel (RIS à un échantillon).
//!
//! Deux candidats, survivre (poids `c`) et rejeter (poids `1 - c`). Le
//! candidat qui répète la décision précédente est pénalisé, l'autre est
//! favorisé d'autant plus que la série est longue. L'erreur de couverture
//! accumulée est réinjectée dans la probabilité et bornée à ±1 par forçage,
//! ce qui garde la fraction de survie à long terme égale à `c`.

use sd_core::config::AdaptiveWeights;

use crate::reservoir::{MAX_RUN, ReservoirRecord};

/// Run length beyond which the novelty boost stops growing.
const NOVELTY_RUN_CAP: u8 = 8;

/// Paramètres du pas RIS.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RisParams {
    /// Scale `1 - repeat_penalty` applied to the repeating candidate.
    pub repeat_penalty: f32,
    /// Scale `1 + novelty_boost · min(run, 8) / 8` applied to the other one.
    pub novelty_boost: f32,
    /// Feedback of the accumulated error into the probability.
    pub gain: f32,
}

impl Default for RisParams {
    fn default() -> Self {
        Self::from_weights(&AdaptiveWeights::default())
    }
}

impl RisParams {
    /// Take the penalty and boost from the adaptive weights.
    #[must_use]
    pub fn from_weights(weights: &AdaptiveWeights) -> Self {
        Self {
            repeat_penalty: weights.repeat_penalty.clamp(0.0, 1.0),
            novelty_boost: weights.novelty_boost.max(0.0),
            gain: 0.25,
        }
    }

    /// Survive probability given the previous record.
    #[must_use]
    pub fn probability(&self, coverage: f32, prev: &ReservoirRecord) -> f32 {
        let mut w1 = coverage;
        let mut w0 = 1.0 - coverage;
        let repeat = 1.0 - self.repeat_penalty;
        let novelty =
            1.0 + self.novelty_boost * f32::from(prev.run.min(NOVELTY_RUN_CAP)) / f32::from(NOVELTY_RUN_CAP);
        if prev.outcome {
            w1 *= repeat;
            w0 *= novelty;
        } else {
            w0 *= repeat;
            w1 *= novelty;
        }
        let sum = w1 + w0;
        let base = if sum > 0.0 { w1 / sum } else { coverage };
        (base + self.gain * prev.error).clamp(0.0, 1.0)
    }
}

/// Décide un fragment et produit l'enregistrement à écrire.
///
/// `u` est un uniforme dans [0, 1) ; `history` vaut `None` sans historique
/// valide, auquel cas la décision est un simple tirage `u < c`.
///
/// # Example
/// ```
/// use sd_dither::ris::{RisParams, ris_step};
/// let first = ris_step(0.5, 0.2, None, &RisParams::default());
/// assert!(first.outcome);
/// assert_eq!(first.run, 1);
/// assert!((first.error + 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn ris_step(
    coverage: f32,
    u: f32,
    history: Option<ReservoirRecord>,
    params: &RisParams,
) -> ReservoirRecord {
    let c = if coverage.is_nan() { 0.0 } else { coverage.clamp(0.0, 1.0) };

    let Some(prev) = history else {
        let outcome = u < c;
        return ReservoirRecord {
            outcome,
            run: 1,
            error: c - f32::from(u8::from(outcome)),
        };
    };

    let outcome = if prev.error >= 1.0 {
        true
    } else if prev.error <= -1.0 {
        false
    } else {
        u < params.probability(c, &prev)
    };

    let run = if outcome == prev.outcome {
        prev.run.saturating_add(1).min(MAX_RUN)
    } else {
        1
    };

    ReservoirRecord {
        outcome,
        run,
        error: prev.error + c - f32::from(u8::from(outcome)),
    }
}
