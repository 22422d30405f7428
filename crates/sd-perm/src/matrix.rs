//! Matrices de permutation N×N (N ∈ {2, 3, 4}) utilisées comme seuils de tramage.
//! Chaque valeur 0..N² apparaît exactement une fois.

use std::fmt;

use sd_core::DitherError;
use serde::{Deserialize, Serialize};

/// Plus grand côté supporté (4 bits par cellule).
pub const MAX_SIDE: usize = 4;

/// Cellules d'une matrice de côté maximal.
pub const MAX_CELLS: usize = MAX_SIDE * MAX_SIDE;

/// Matrice de Bayer 2x2. Normalisée sur 4 niveaux (0-3).
pub const BAYER_2X2: [[u8; 2]; 2] = [[0, 2], [3, 1]];

/// Matrice ordonnée 3x3. Normalisée sur 9 niveaux (0-8).
pub const ORDERED_3X3: [[u8; 3]; 3] = [[0, 7, 3], [6, 5, 2], [4, 1, 8]];

/// Matrice de Bayer 4x4. Normalisée sur 16 niveaux (0-15).
pub const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Matrice de Bayer 8x8. Normalisée sur 64 niveaux (0-63). Base du motif fractal.
pub const BAYER_8X8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Grille N×N de rangs distincts, row-major.
///
/// `Copy` et ordonnable : les recherches la manipulent par valeur et la
/// dédupliquent dans des `BTreeSet`.
///
/// # Example
/// ```
/// use sd_perm::matrix::PermutationMatrix;
/// let m = PermutationMatrix::from_cells(2, &[0, 2, 3, 1]).unwrap();
/// assert_eq!(m.get(1, 0), 2);
/// assert_eq!(m, PermutationMatrix::seed(2).unwrap());
/// assert!(PermutationMatrix::from_cells(2, &[0, 0, 3, 1]).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermutationMatrix {
    n: u8,
    cells: [u8; MAX_CELLS],
}

impl PermutationMatrix {
    /// Validate and build a matrix from N² row-major cells.
    ///
    /// # Errors
    /// Unsupported side, wrong cell count, value ≥ N², or duplicate value.
    pub fn from_cells(n: usize, cells: &[u8]) -> Result<Self, DitherError> {
        check_side(n)?;
        let count = n * n;
        if cells.len() != count {
            return Err(DitherError::CellCount {
                n,
                expected: count,
                found: cells.len(),
            });
        }
        let mut seen = 0u32;
        for &v in cells {
            if usize::from(v) >= count {
                return Err(DitherError::ValueOutOfRange {
                    value: u32::from(v),
                    limit: count as u32,
                });
            }
            if seen & (1 << v) != 0 {
                return Err(DitherError::DuplicateValue { value: u32::from(v) });
            }
            seen |= 1 << v;
        }
        Ok(Self::from_cells_unchecked(n, cells))
    }

    /// Build without validation. Callers guarantee a permutation of 0..N².
    #[inline(always)]
    pub(crate) fn from_cells_unchecked(n: usize, cells: &[u8]) -> Self {
        let mut packed = [0u8; MAX_CELLS];
        packed[..cells.len()].copy_from_slice(cells);
        Self {
            n: n as u8,
            cells: packed,
        }
    }

    /// Matrice de départ pour une taille : Bayer 2×2, ordonnée 3×3, Bayer 4×4.
    ///
    /// Sert de graine au recuit et de repli quand aucune recherche n'aboutit.
    ///
    /// # Errors
    /// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
    pub fn seed(n: usize) -> Result<Self, DitherError> {
        let cells: Vec<u8> = match n {
            2 => BAYER_2X2.iter().flatten().copied().collect(),
            3 => ORDERED_3X3.iter().flatten().copied().collect(),
            4 => BAYER_4X4.iter().flatten().copied().collect(),
            _ => return Err(DitherError::UnsupportedSize { n }),
        };
        Ok(Self::from_cells_unchecked(n, &cells))
    }

    /// Matrix side N.
    #[inline(always)]
    #[must_use]
    pub fn n(&self) -> usize {
        usize::from(self.n)
    }

    /// The N² row-major cells.
    #[inline(always)]
    #[must_use]
    pub fn cells(&self) -> &[u8] {
        let n = self.n();
        &self.cells[..n * n]
    }

    /// Value at column `x`, row `y`.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.cells[y * self.n() + x]
    }

    /// Value at a pixel, wrapping the coordinates onto the tile.
    #[inline(always)]
    #[must_use]
    pub fn at_pixel(&self, x: u32, y: u32) -> u8 {
        let n = u32::from(self.n);
        self.get((x % n) as usize, (y % n) as usize)
    }

    /// Swap two cells by flat index.
    #[inline(always)]
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.cells.swap(a, b);
    }

    /// Re-check the permutation invariant.
    #[must_use]
    pub fn is_permutation(&self) -> bool {
        Self::from_cells(self.n(), self.cells()).is_ok()
    }
}

/// Reject sides whose cell values do not fit in a nibble.
///
/// # Errors
/// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
pub fn check_side(n: usize) -> Result<(), DitherError> {
    if (2..=MAX_SIDE).contains(&n) {
        Ok(())
    } else {
        Err(DitherError::UnsupportedSize { n })
    }
}

impl fmt::Debug for PermutationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermutationMatrix{}x{}{:?}", self.n, self.n, self.cells())
    }
}

impl fmt::Display for PermutationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.n();
        for row in self.cells().chunks(n) {
            let line: Vec<String> = row.iter().map(|v| format!("{v:>2}")).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_permutations() {
        for n in 2..=4 {
            let m = PermutationMatrix::seed(n).unwrap();
            assert!(m.is_permutation(), "seed {n}x{n} must be a permutation");
            assert_eq!(m.cells().len(), n * n);
        }
    }

    #[test]
    fn validation_errors() {
        assert_eq!(
            PermutationMatrix::from_cells(5, &[0; 25]).unwrap_err(),
            DitherError::UnsupportedSize { n: 5 }
        );
        assert_eq!(
            PermutationMatrix::from_cells(2, &[0, 1, 2]).unwrap_err(),
            DitherError::CellCount { n: 2, expected: 4, found: 3 }
        );
        assert_eq!(
            PermutationMatrix::from_cells(2, &[0, 1, 2, 4]).unwrap_err(),
            DitherError::ValueOutOfRange { value: 4, limit: 4 }
        );
        assert_eq!(
            PermutationMatrix::from_cells(2, &[0, 1, 1, 3]).unwrap_err(),
            DitherError::DuplicateValue { value: 1 }
        );
    }

    #[test]
    fn at_pixel_wraps() {
        let m = PermutationMatrix::seed(4).unwrap();
        assert_eq!(m.at_pixel(5, 6), m.get(1, 2));
        assert_eq!(m.at_pixel(4, 4), 0);
    }

    #[test]
    fn display_prints_rows() {
        let m = PermutationMatrix::seed(2).unwrap();
        assert_eq!(m.to_string(), " 0  2\n 3  1\n");
    }

    #[test]
    fn bayer_8x8_is_a_permutation_of_64_levels() {
        let mut seen = [false; 64];
        for v in BAYER_8X8.iter().flatten() {
            assert!(!seen[*v as usize]);
            seen[*v as usize] = true;
        }
    }
}
