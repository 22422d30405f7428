use rayon::prelude::*;
use sd_core::DitherError;
use sd_core::config::ScoreRule;

use super::{ScoreBand, Scored, TopK, next_permutation};
use crate::matrix::{MAX_CELLS, PermutationMatrix};
use crate::score::{score_cells, torus_distance_score};

/// Énumère toutes les permutations de 0..N² et garde les `max_results` meilleures.
///
/// Un worker rayon par valeur de la première cellule ; chacun énumère les
/// (N²-1)! permutations restantes dans l'ordre lexicographique et tient son
/// propre top-K, fusionné à la fin. Les scores hors bande (dont 0) sont ignorés.
///
/// Peut retourner une liste vide (aucune permutation 2×2 ne passe la règle
/// d'adjacence) ; le repli sur la graine est fait par [`super::search`].
///
/// # Errors
/// Returns [`DitherError::UnsupportedSize`] unless `n` is 2 or 3.
///
/// # Example
/// ```
/// use sd_core::config::ScoreRule;
/// use sd_perm::search::{ScoreBand, search_exhaustive};
/// assert!(search_exhaustive(2, ScoreRule::Adjacency, ScoreBand::ANY, 8).unwrap().is_empty());
/// ```
pub fn search_exhaustive(
    n: usize,
    rule: ScoreRule,
    band: ScoreBand,
    max_results: usize,
) -> Result<Vec<Scored>, DitherError> {
    if !(2..=3).contains(&n) {
        return Err(DitherError::UnsupportedSize { n });
    }
    let count = n * n;

    let merged = (0..count as u8)
        .into_par_iter()
        .map(|first| enumerate_with_first(n, first, rule, band, max_results))
        .reduce(
            || TopK::new(max_results),
            |mut acc, part| {
                acc.extend(part.into_sorted());
                acc
            },
        );

    let ranked = merged.into_sorted();
    log::debug!(
        "Recherche exhaustive {n}x{n} : {} candidats dans la bande [{}, {}]",
        ranked.len(),
        band.min,
        band.max
    );
    Ok(ranked)
}

fn enumerate_with_first(
    n: usize,
    first: u8,
    rule: ScoreRule,
    band: ScoreBand,
    max_results: usize,
) -> TopK {
    let count = n * n;
    let mut rest: Vec<u8> = (0..count as u8).filter(|&v| v != first).collect();
    let mut cells = [0u8; MAX_CELLS];
    cells[0] = first;
    let mut top = TopK::new(max_results);

    loop {
        cells[1..count].copy_from_slice(&rest);
        let score = match rule {
            ScoreRule::Adjacency => score_cells(n, &cells[..count]),
            ScoreRule::TorusDistance => {
                torus_distance_score(&PermutationMatrix::from_cells_unchecked(n, &cells[..count]))
            }
        };
        if band.accepts(score) {
            top.offer(Scored {
                score,
                matrix: PermutationMatrix::from_cells_unchecked(n, &cells[..count]),
            });
        }
        if !next_permutation(&mut rest) {
            break;
        }
    }
    top
}
