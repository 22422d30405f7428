//! Scoring des matrices de permutation sur le tore N×N.
//!
//! Règle principale (adjacence) : pour chaque cellule, différence au carré avec
//! le voisin de droite et celui du dessous (bords repliés). Deux voisins qui
//! diffèrent d'exactement un niveau donnent un escalier visible dans la rampe
//! de tramage : la matrice vaut alors 0 (rejet). Sinon le score est la somme
//! des différences au carré, plus elle est haute plus les niveaux sont séparés.

use sd_core::config::ScoreRule;

use crate::matrix::PermutationMatrix;

/// Score d'une matrice. 0 = rejet.
pub type Score = u32;

/// Adjacency score of a matrix.
///
/// # Example
/// ```
/// use sd_perm::matrix::PermutationMatrix;
/// use sd_perm::score::score;
/// // 0 and 1 sit side by side: rejected.
/// let m = PermutationMatrix::from_cells(3, &[0, 1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
/// assert_eq!(score(&m), 0);
/// let good = PermutationMatrix::from_cells(3, &[0, 5, 7, 3, 8, 1, 6, 2, 4]).unwrap();
/// assert!(score(&good) > 0);
/// ```
#[inline]
#[must_use]
pub fn score(matrix: &PermutationMatrix) -> Score {
    score_cells(matrix.n(), matrix.cells())
}

/// Adjacency score over raw row-major cells.
///
/// Hot loop of the exhaustive search: no allocation, early exit on the
/// first consecutive pair.
#[inline]
#[must_use]
pub fn score_cells(n: usize, cells: &[u8]) -> Score {
    let mut sum = 0u32;
    for y in 0..n {
        let row = y * n;
        let below = ((y + 1) % n) * n;
        for x in 0..n {
            let v = i32::from(cells[row + x]);
            let right = i32::from(cells[row + (x + 1) % n]);
            let down = i32::from(cells[below + x]);
            let dr = (v - right) * (v - right);
            let dd = (v - down) * (v - down);
            if dr == 1 || dd == 1 {
                return 0;
            }
            sum += (dr + dd) as u32;
        }
    }
    sum
}

/// `true` if some toroidal 4-neighbour pair differs by exactly one level.
#[must_use]
pub fn has_consecutive_neighbours(matrix: &PermutationMatrix) -> bool {
    let n = matrix.n();
    (0..n).any(|y| {
        (0..n).any(|x| {
            let v = i32::from(matrix.get(x, y));
            let right = i32::from(matrix.get((x + 1) % n, y));
            let down = i32::from(matrix.get(x, (y + 1) % n));
            (v - right).abs() == 1 || (v - down).abs() == 1
        })
    })
}

/// Toroidal L1 distance between two cells.
#[inline]
fn torus_distance(n: usize, a: usize, b: usize) -> usize {
    let (x1, y1) = (a % n, a / n);
    let (x2, y2) = (b % n, b / n);
    let dx = x1.abs_diff(x2).min(n - x1.abs_diff(x2));
    let dy = y1.abs_diff(y2).min(n - y1.abs_diff(y2));
    dx + dy
}

/// Règle historique « distance torique » : somme des écarts de valeur divisés
/// par la distance torique sur toutes les paires, plus l'espacement 1D replié.
///
/// Ne rejette jamais. Résultat mis à l'échelle ×100 et arrondi.
#[must_use]
pub fn torus_distance_score(matrix: &PermutationMatrix) -> Score {
    let n = matrix.n();
    let cells = matrix.cells();
    let count = cells.len();

    let mut sum_inverse_dist = 0.0f64;
    for i in 0..count {
        for j in (i + 1)..count {
            let d = torus_distance(n, i, j);
            if d > 0 {
                let diff = f64::from(cells[i].abs_diff(cells[j]));
                sum_inverse_dist += diff / d as f64;
            }
        }
    }

    let mut min_spacing = u32::MAX;
    let mut sum_spacing = 0u32;
    for i in 0..count {
        let spacing = u32::from(cells[i].abs_diff(cells[(i + 1) % count]));
        min_spacing = min_spacing.min(spacing);
        sum_spacing += spacing;
    }

    let total = sum_inverse_dist
        + f64::from(min_spacing) * count as f64
        + f64::from(sum_spacing) * 3.0;
    (total * 100.0).round() as Score
}

/// Score under the configured rule.
#[inline]
#[must_use]
pub fn score_with(rule: ScoreRule, matrix: &PermutationMatrix) -> Score {
    match rule {
        ScoreRule::Adjacency => score(matrix),
        ScoreRule::TorusDistance => torus_distance_score(matrix),
    }
}
