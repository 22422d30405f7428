//! Recherche des meilleures matrices de permutation.
//!
//! - N ≤ 3 : énumération exhaustive des N²! permutations (9! = 362 880).
//! - N = 4 : 16! est hors de portée, recuit simulé depuis la graine de Bayer.
//!
//! Le résultat est toujours trié du meilleur au moins bon, dédupliqué, et
//! jamais vide : sans candidat positif on retombe sur la graine.

pub mod anneal;
pub mod exhaustive;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use sd_core::DitherError;
use sd_core::config::{ScoreRule, SearchSettings};
use serde::{Deserialize, Serialize};

use crate::matrix::{PermutationMatrix, check_side};
use crate::score::{Score, score_with};

pub use anneal::{AnnealParams, search_annealed};
pub use exhaustive::search_exhaustive;

/// Matrice accompagnée de son score.
///
/// L'ordre naturel place le meilleur score en premier ; à score égal, ordre
/// lexicographique des cellules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scored {
    /// Score under the search rule.
    pub score: Score,
    /// The matrix.
    pub matrix: PermutationMatrix,
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.matrix.cmp(&other.matrix))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Inclusive score band. Zero is never accepted.
///
/// # Example
/// ```
/// use sd_perm::search::ScoreBand;
/// let band = ScoreBand::new(Some(100), Some(200));
/// assert!(band.accepts(150));
/// assert!(!band.accepts(201));
/// assert!(!ScoreBand::ANY.accepts(0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreBand {
    /// Lowest accepted score (at least 1).
    pub min: Score,
    /// Highest accepted score.
    pub max: Score,
}

impl ScoreBand {
    /// Every strictly positive score.
    pub const ANY: ScoreBand = ScoreBand {
        min: 1,
        max: Score::MAX,
    };

    /// Band from optional bounds.
    #[must_use]
    pub fn new(min: Option<Score>, max: Option<Score>) -> Self {
        Self {
            min: min.unwrap_or(1).max(1),
            max: max.unwrap_or(Score::MAX),
        }
    }

    /// `true` if the score is positive and inside the band.
    #[inline(always)]
    #[must_use]
    pub fn accepts(&self, score: Score) -> bool {
        score >= self.min && score <= self.max
    }
}

/// Bounded best-K collection, deduplicated.
pub(crate) struct TopK {
    set: BTreeSet<Scored>,
    capacity: usize,
}

impl TopK {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            set: BTreeSet::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn offer(&mut self, candidate: Scored) {
        if self.set.len() < self.capacity {
            self.set.insert(candidate);
            return;
        }
        let worse_than_all = self.set.last().is_some_and(|worst| candidate >= *worst);
        if !worse_than_all && self.set.insert(candidate) {
            self.set.pop_last();
        }
    }

    pub(crate) fn extend(&mut self, other: impl IntoIterator<Item = Scored>) {
        for s in other {
            self.offer(s);
        }
    }

    pub(crate) fn into_sorted(self) -> Vec<Scored> {
        self.set.into_iter().collect()
    }
}

/// Lexicographic next permutation in place. Returns `false` once wrapped to the last one.
pub(crate) fn next_permutation(values: &mut [u8]) -> bool {
    if values.len() < 2 {
        return false;
    }
    let mut i = values.len() - 1;
    while i > 0 && values[i - 1] >= values[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = values.len() - 1;
    while values[j] <= values[i - 1] {
        j -= 1;
    }
    values.swap(i - 1, j);
    values[i..].reverse();
    true
}

/// Lance la recherche adaptée à la taille et applique le repli sur la graine.
///
/// # Errors
/// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
///
/// # Example
/// ```
/// use sd_core::config::SearchSettings;
/// use sd_perm::search::search;
/// let settings = SearchSettings { max_results: 16, ..SearchSettings::default() };
/// let best = search(3, &settings).unwrap();
/// assert_eq!(best.len(), 16);
/// assert!(best.windows(2).all(|w| w[0].score >= w[1].score));
/// ```
pub fn search(n: usize, settings: &SearchSettings) -> Result<Vec<Scored>, DitherError> {
    check_side(n)?;
    let band = ScoreBand::new(settings.min_score, settings.max_score);

    let ranked = if n <= 3 {
        search_exhaustive(n, settings.rule, band, settings.max_results)?
    } else {
        let params = AnnealParams::from_settings(settings);
        search_annealed(n, &params)?
    };

    if ranked.is_empty() {
        return seed_fallback(n, settings.rule);
    }
    log::info!(
        "Permutations {n}x{n} : {} retenues, scores {}..={}",
        ranked.len(),
        ranked.last().map_or(0, |s| s.score),
        ranked.first().map_or(0, |s| s.score),
    );
    Ok(ranked)
}

/// Graine seule, avec son score (éventuellement nul).
pub(crate) fn seed_fallback(n: usize, rule: ScoreRule) -> Result<Vec<Scored>, DitherError> {
    let matrix = PermutationMatrix::seed(n)?;
    log::warn!("Aucune permutation {n}x{n} qualifiée, repli sur la matrice de départ.");
    Ok(vec![Scored {
        score: score_with(rule, &matrix),
        matrix,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_permutation_enumerates_all() {
        let mut v = [0u8, 1, 2, 3];
        let mut count = 1;
        while next_permutation(&mut v) {
            count += 1;
        }
        assert_eq!(count, 24);
        assert_eq!(v, [3, 2, 1, 0]);
    }

    #[test]
    fn scored_orders_best_first() {
        let m = PermutationMatrix::seed(3).unwrap();
        let mut v = vec![
            Scored { score: 5, matrix: m },
            Scored { score: 9, matrix: m },
            Scored { score: 7, matrix: m },
        ];
        v.sort();
        let scores: Vec<_> = v.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![9, 7, 5]);
    }

    #[test]
    fn top_k_keeps_best_and_dedups() {
        let a = PermutationMatrix::from_cells(2, &[0, 1, 2, 3]).unwrap();
        let b = PermutationMatrix::from_cells(2, &[3, 2, 1, 0]).unwrap();
        let mut top = TopK::new(2);
        top.offer(Scored { score: 1, matrix: a });
        top.offer(Scored { score: 3, matrix: b });
        top.offer(Scored { score: 3, matrix: b });
        top.offer(Scored { score: 2, matrix: a });
        top.offer(Scored { score: 0, matrix: b });
        let out = top.into_sorted();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].score, 3);
        assert_eq!(out[1].score, 2);
    }

    #[test]
    fn two_by_two_falls_back_to_bayer() {
        let result = search(2, &SearchSettings::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].matrix, PermutationMatrix::seed(2).unwrap());
    }

    #[test]
    fn unsupported_sizes_error() {
        assert!(search(1, &SearchSettings::default()).is_err());
        assert!(search(5, &SearchSettings::default()).is_err());
    }
}
