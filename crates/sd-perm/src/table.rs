//! Table de permutations triée et empaquetée en mots de 32 bits.
//!
//! Format : 4 bits par cellule, cellule 0 dans les bits de poids faible.
//! Seules les N²-1 premières cellules sont stockées, la dernière est la
//! valeur manquante. 2×2 et 3×3 tiennent dans un mot, 4×4 dans deux.
//! Les bits au-dessus du dernier quartet sont à zéro.

use sd_core::DitherError;
use sd_core::config::SearchSettings;
use serde::{Deserialize, Serialize};

use crate::matrix::{MAX_CELLS, PermutationMatrix, check_side};
use crate::search::{Scored, search};

const NIBBLE_BITS: usize = 4;
const NIBBLES_PER_WORD: usize = 32 / NIBBLE_BITS;

/// Mots de 32 bits occupés par une matrice N×N.
///
/// # Errors
/// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
///
/// # Example
/// ```
/// use sd_perm::table::words_per_matrix;
/// assert_eq!(words_per_matrix(2).unwrap(), 1);
/// assert_eq!(words_per_matrix(3).unwrap(), 1);
/// assert_eq!(words_per_matrix(4).unwrap(), 2);
/// ```
pub fn words_per_matrix(n: usize) -> Result<usize, DitherError> {
    check_side(n)?;
    Ok((n * n - 1).div_ceil(NIBBLES_PER_WORD))
}

/// Pack raw row-major cells, validating them first.
///
/// # Errors
/// Unsupported side, wrong cell count, value ≥ N², duplicate value.
pub fn pack_cells(n: usize, cells: &[u8]) -> Result<Vec<u32>, DitherError> {
    let matrix = PermutationMatrix::from_cells(n, cells)?;
    pack(n, &[matrix])
}

/// Empaquette des matrices d'un même côté N, dans l'ordre donné.
///
/// # Errors
/// Unsupported side or a matrix whose side is not `n`.
///
/// # Example
/// ```
/// use sd_perm::matrix::PermutationMatrix;
/// use sd_perm::table::{pack, unpack};
/// let m = PermutationMatrix::seed(4).unwrap();
/// let words = pack(4, &[m]).unwrap();
/// assert_eq!(words.len(), 2);
/// assert_eq!(unpack(4, &words).unwrap(), vec![m]);
/// ```
pub fn pack(n: usize, matrices: &[PermutationMatrix]) -> Result<Vec<u32>, DitherError> {
    let stride = words_per_matrix(n)?;
    let mut words = Vec::with_capacity(matrices.len() * stride);
    for m in matrices {
        if m.n() != n {
            return Err(DitherError::SizeMismatch {
                expected: n,
                found: m.n(),
            });
        }
        let mut packed = vec![0u32; stride];
        for (i, &v) in m.cells()[..n * n - 1].iter().enumerate() {
            packed[i / NIBBLES_PER_WORD] |= u32::from(v) << ((i % NIBBLES_PER_WORD) * NIBBLE_BITS);
        }
        words.extend_from_slice(&packed);
    }
    Ok(words)
}

/// Inverse exact de [`pack`] sur une entrée valide.
///
/// # Errors
/// Length not a multiple of the stride, non-zero padding bits, a stored
/// value ≥ N² or repeated.
pub fn unpack(n: usize, words: &[u32]) -> Result<Vec<PermutationMatrix>, DitherError> {
    let stride = words_per_matrix(n)?;
    if words.len() % stride != 0 {
        return Err(DitherError::TruncatedTable {
            words: words.len(),
            stride,
        });
    }
    let count = n * n;
    let stored = count - 1;
    let used_bits_last = (stored - (stride - 1) * NIBBLES_PER_WORD) * NIBBLE_BITS;

    words
        .chunks_exact(stride)
        .enumerate()
        .map(|(entry, chunk)| {
            let last = chunk[stride - 1];
            if used_bits_last < 32 && last >> used_bits_last != 0 {
                return Err(DitherError::PaddingBits {
                    word: entry * stride + stride - 1,
                });
            }
            let mut cells = [0u8; MAX_CELLS];
            let mut seen = 0u32;
            for (i, cell) in cells.iter_mut().enumerate().take(stored) {
                let word = chunk[i / NIBBLES_PER_WORD];
                let v = (word >> ((i % NIBBLES_PER_WORD) * NIBBLE_BITS)) & 0xF;
                if v as usize >= count {
                    return Err(DitherError::ValueOutOfRange {
                        value: v,
                        limit: count as u32,
                    });
                }
                if seen & (1 << v) != 0 {
                    return Err(DitherError::DuplicateValue { value: v });
                }
                seen |= 1 << v;
                *cell = v as u8;
            }
            let missing = (!seen & ((1u32 << count) - 1)).trailing_zeros();
            cells[stored] = missing as u8;
            Ok(PermutationMatrix::from_cells_unchecked(n, &cells[..count]))
        })
        .collect()
}

/// Table ordonnée de matrices N×N, jamais vide.
///
/// # Example
/// ```
/// use sd_perm::table::PermutationTable;
/// let table = PermutationTable::seed_only(3).unwrap();
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.value_at(5, 0, 0), table.get(0).get(0, 0));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationTable {
    n: usize,
    entries: Vec<Scored>,
}

impl PermutationTable {
    /// Build from scored entries: sorted best-first, deduplicated, validated.
    /// An empty list is replaced by the seed.
    ///
    /// # Errors
    /// Unsupported side or mixed sizes.
    pub fn new(n: usize, mut entries: Vec<Scored>) -> Result<Self, DitherError> {
        check_side(n)?;
        if let Some(bad) = entries.iter().find(|s| s.matrix.n() != n) {
            return Err(DitherError::SizeMismatch {
                expected: n,
                found: bad.matrix.n(),
            });
        }
        entries.sort();
        entries.dedup_by(|a, b| a.matrix == b.matrix);
        if entries.is_empty() {
            return Self::seed_only(n);
        }
        Ok(Self { n, entries })
    }

    /// Run the search for `n` and wrap the result.
    ///
    /// # Errors
    /// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
    pub fn build(n: usize, settings: &SearchSettings) -> Result<Self, DitherError> {
        Self::new(n, search(n, settings)?)
    }

    /// Table réduite à la matrice de départ.
    ///
    /// # Errors
    /// Returns [`DitherError::UnsupportedSize`] outside 2..=4.
    pub fn seed_only(n: usize) -> Result<Self, DitherError> {
        let matrix = PermutationMatrix::seed(n)?;
        Ok(Self {
            n,
            entries: vec![Scored {
                score: crate::score::score(&matrix),
                matrix,
            }],
        })
    }

    /// Matrix side.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Entry count (at least 1).
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Scored entries, best first.
    #[must_use]
    pub fn entries(&self) -> &[Scored] {
        &self.entries
    }

    /// Entry by index, wrapping.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, index: u32) -> &PermutationMatrix {
        &self.entries[index as usize % self.entries.len()].matrix
    }

    /// Threshold rank of pixel `(x, y)` in table entry `index` (wrapping).
    #[inline(always)]
    #[must_use]
    pub fn value_at(&self, index: u32, x: u32, y: u32) -> u8 {
        self.get(index).at_pixel(x, y)
    }

    /// Packed words of every entry, in table order.
    ///
    /// # Errors
    /// Never on a table built by this type; kept fallible like [`pack`].
    pub fn pack(&self) -> Result<Vec<u32>, DitherError> {
        let matrices: Vec<_> = self.entries.iter().map(|s| s.matrix).collect();
        pack(self.n, &matrices)
    }

    /// Rebuild a table from packed words. Scores are recomputed.
    ///
    /// # Errors
    /// Any [`unpack`] error.
    pub fn from_packed(n: usize, words: &[u32]) -> Result<Self, DitherError> {
        let entries = unpack(n, words)?
            .into_iter()
            .map(|matrix| Scored {
                score: crate::score::score(&matrix),
                matrix,
            })
            .collect();
        Self::new(n, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nibbles_are_low_cell_first() {
        let words = pack_cells(3, &[0, 5, 7, 3, 8, 1, 6, 2, 4]).unwrap();
        assert_eq!(words, vec![0x2618_3750]);
    }

    #[test]
    fn two_by_two_uses_twelve_bits() {
        let words = pack_cells(2, &[0, 2, 3, 1]).unwrap();
        assert_eq!(words, vec![0x320]);
        assert_eq!(unpack(2, &words).unwrap()[0].cells(), &[0, 2, 3, 1]);
    }

    #[test]
    fn four_by_four_padding_is_zero() {
        let words = pack(4, &[PermutationMatrix::seed(4).unwrap()]).unwrap();
        assert_eq!(words[1] >> 28, 0);
    }

    #[test]
    fn pack_rejects_bad_cells() {
        assert_eq!(
            pack_cells(3, &[0, 1, 2, 3, 4, 5, 6, 7, 9]).unwrap_err(),
            DitherError::ValueOutOfRange { value: 9, limit: 9 }
        );
        assert_eq!(
            pack_cells(3, &[0, 1, 2, 3, 4, 5, 6, 7, 7]).unwrap_err(),
            DitherError::DuplicateValue { value: 7 }
        );
        assert!(matches!(pack_cells(3, &[0, 1, 2]), Err(DitherError::CellCount { .. })));
        assert_eq!(pack_cells(5, &[0; 25]).unwrap_err(), DitherError::UnsupportedSize { n: 5 });
        assert_eq!(
            pack(3, &[PermutationMatrix::seed(2).unwrap()]).unwrap_err(),
            DitherError::SizeMismatch { expected: 3, found: 2 }
        );
    }

    #[test]
    fn unpack_rejects_malformed_words() {
        assert_eq!(
            unpack(4, &[0x0123_4567]).unwrap_err(),
            DitherError::TruncatedTable { words: 1, stride: 2 }
        );
        assert_eq!(unpack(2, &[0x1320]).unwrap_err(), DitherError::PaddingBits { word: 0 });
        assert_eq!(
            unpack(2, &[0x220]).unwrap_err(),
            DitherError::DuplicateValue { value: 2 }
        );
        assert_eq!(
            unpack(2, &[0x520]).unwrap_err(),
            DitherError::ValueOutOfRange { value: 5, limit: 4 }
        );
    }

    #[test]
    fn table_sorts_and_dedups() {
        let a = PermutationMatrix::from_cells(3, &[0, 5, 7, 3, 8, 1, 6, 2, 4]).unwrap();
        let b = PermutationMatrix::seed(3).unwrap();
        let table = PermutationTable::new(
            3,
            vec![
                Scored { score: 10, matrix: b },
                Scored { score: 342, matrix: a },
                Scored { score: 342, matrix: a },
            ],
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(*table.get(0), a);
        assert_eq!(*table.get(3), b);
    }

    #[test]
    fn empty_table_falls_back_to_seed() {
        let table = PermutationTable::new(2, Vec::new()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(*table.get(0), PermutationMatrix::seed(2).unwrap());
    }

    #[test]
    fn packed_table_round_trips() {
        let settings = SearchSettings {
            max_results: 12,
            ..SearchSettings::default()
        };
        let table = PermutationTable::build(3, &settings).unwrap();
        let words = table.pack().unwrap();
        assert_eq!(words.len(), table.len());
        assert_eq!(PermutationTable::from_packed(3, &words).unwrap(), table);
    }
}
