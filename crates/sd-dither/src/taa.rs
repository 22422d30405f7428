//! Masques 5-voisinage pour l'anti-aliasing temporel.
//!
//! La classe `(x + 2y) mod 5` donne à chaque voisinage en croix (le pixel et
//! ses 4 voisins) une classe de chaque sorte. La couverture est quantifiée
//! sur 5 niveaux, la classe tourne avec la frame : sur 5 frames chaque pixel
//! passe par toutes les classes, et dans toute croix exactement
//! `round(5c)` pixels survivent.

use crate::grid::rank_survives;
use crate::hash::pcg;

/// Nombre de classes (taille du voisinage en croix).
pub const TAA_CLASSES: u32 = 5;

/// Nombre de permutations de [0..5).
pub const TAA_PERMUTATION_COUNT: u32 = 120;

/// Classe d'un pixel.
#[inline(always)]
#[must_use]
pub fn pixel_class(x: u32, y: u32) -> u32 {
    ((x % TAA_CLASSES) + 2 * (y % TAA_CLASSES)) % TAA_CLASSES
}

/// Permutation `index` (mod 120) de [0..5), par code de Lehmer.
///
/// # Example
/// ```
/// use sd_dither::taa::mask_permutation;
/// assert_eq!(mask_permutation(0), [0, 1, 2, 3, 4]);
/// assert_eq!(mask_permutation(119), [4, 3, 2, 1, 0]);
/// ```
#[must_use]
pub const fn mask_permutation(index: u32) -> [u8; 5] {
    let mut rest = [0u8, 1, 2, 3, 4];
    let mut len = 5;
    let mut code = index % TAA_PERMUTATION_COUNT;
    let mut out = [0u8; 5];
    let mut radix = 24;
    let mut i = 0;
    while i < 5 {
        let pick = (code / radix) as usize;
        code %= radix;
        out[i] = rest[pick];
        let mut j = pick;
        while j + 1 < len {
            rest[j] = rest[j + 1];
            j += 1;
        }
        len -= 1;
        if len > 1 {
            radix /= len as u32;
        }
        i += 1;
    }
    out
}

const fn build_mask_table() -> [[u8; 5]; TAA_PERMUTATION_COUNT as usize] {
    let mut table = [[0u8; 5]; TAA_PERMUTATION_COUNT as usize];
    let mut i = 0;
    while i < table.len() {
        table[i] = mask_permutation(i as u32);
        i += 1;
    }
    table
}

/// Les 120 permutations, précalculées.
pub const MASK_PERMUTATIONS: [[u8; 5]; TAA_PERMUTATION_COUNT as usize] = build_mask_table();

/// Rang du pixel parmi les 5 classes pour cette frame.
#[inline]
#[must_use]
pub fn taa_rank(x: u32, y: u32, frame: u32, permutations: bool, signal: u32) -> u32 {
    let class = (pixel_class(x, y) + frame % TAA_CLASSES) % TAA_CLASSES;
    if permutations {
        u32::from(MASK_PERMUTATIONS[(pcg(signal) % TAA_PERMUTATION_COUNT) as usize][class as usize])
    } else {
        class
    }
}

/// Décision du mode temporal AA. `signal` choisit la permutation quand
/// `permutations` est actif.
#[inline]
#[must_use]
pub fn taa_decide(x: u32, y: u32, frame: u32, coverage: f32, permutations: bool, signal: u32) -> bool {
    rank_survives(taa_rank(x, y, frame, permutations, signal), TAA_CLASSES, coverage, None)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn plus_neighbourhood_holds_every_class() {
        for y in 5..15 {
            for x in 5..15 {
                let classes: BTreeSet<u32> = [(x, y), (x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
                    .iter()
                    .map(|&(px, py)| pixel_class(px, py))
                    .collect();
                assert_eq!(classes.len(), 5);
            }
        }
    }

    #[test]
    fn all_120_permutations_are_distinct() {
        let all: BTreeSet<[u8; 5]> = (0..120).map(mask_permutation).collect();
        assert_eq!(all.len(), 120);
        for p in &all {
            let mut s = *p;
            s.sort_unstable();
            assert_eq!(s, [0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn precomputed_table_matches_lehmer_decoding() {
        for (i, p) in MASK_PERMUTATIONS.iter().enumerate() {
            assert_eq!(*p, mask_permutation(i as u32));
        }
        assert_eq!(mask_permutation(1), [0, 1, 2, 4, 3]);
        assert_eq!(mask_permutation(120), mask_permutation(0));
    }

    #[test]
    fn cross_survivors_match_quantised_coverage() {
        for permutations in [false, true] {
            for c in [0.0f32, 0.3, 0.5, 0.8, 1.0] {
                let expected = (c * 5.0).round() as usize;
                let (x, y) = (7, 9);
                let cross = [(x, y), (x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)];
                for frame in 0..5 {
                    let n = cross
                        .iter()
                        .filter(|&&(px, py)| taa_decide(px, py, frame, c, permutations, 42))
                        .count();
                    assert_eq!(n, expected);
                }
            }
        }
    }
}
