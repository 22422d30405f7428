//! Tables de permutation par taille et décision en grille.

use sd_core::DitherError;
use sd_core::config::SearchSettings;
use sd_perm::table::PermutationTable;

/// Une table optionnelle par côté 2, 3 et 4.
#[derive(Clone, Debug, Default)]
pub struct TableSet {
    tables: [Option<PermutationTable>; 3],
}

impl TableSet {
    #[inline(always)]
    fn slot(n: usize) -> Option<usize> {
        (2..=4).contains(&n).then(|| n - 2)
    }

    /// Table for side `n`, if built.
    #[inline(always)]
    #[must_use]
    pub fn get(&self, n: usize) -> Option<&PermutationTable> {
        Self::slot(n).and_then(|i| self.tables[i].as_ref())
    }

    /// `true` if the table for `n` is present.
    #[must_use]
    pub fn contains(&self, n: usize) -> bool {
        self.get(n).is_some()
    }

    /// Install or replace a table.
    pub fn insert(&mut self, table: PermutationTable) {
        if let Some(i) = Self::slot(table.n()) {
            self.tables[i] = Some(table);
        }
    }

    /// Drop every table (search parameters changed).
    pub fn clear(&mut self) {
        self.tables = Default::default();
    }

    /// Build synchronously the missing tables among `sizes`.
    ///
    /// # Errors
    /// Unsupported side.
    pub fn ensure(&mut self, sizes: &[usize], settings: &SearchSettings) -> Result<(), DitherError> {
        for &n in sizes {
            if !self.contains(n) {
                log::info!("Construction de la table {n}x{n}");
                self.insert(PermutationTable::build(n, settings)?);
            }
        }
        Ok(())
    }
}

/// Rangs de la grille temporelle 2×2×2, indexés `[frame & 1][y & 1][x & 1]`.
///
/// Chaque tranche contient deux rangs pairs et deux impairs, et chaque pixel
/// reçoit un rang bas dans une tranche et un rang haut dans l'autre.
pub const GRID_2X2X2: [[[u8; 2]; 2]; 2] = [[[0, 4], [6, 2]], [[7, 3], [1, 5]]];

/// Compare un rang parmi `levels` au niveau de couverture.
///
/// Sans décalage, survie si `round(c·levels) > rank`. Avec un décalage
/// `t` ∈ [0, 1) (bruit superposé), survie si `rank + t < c·levels`.
///
/// # Example
/// ```
/// use sd_dither::grid::rank_survives;
/// assert!(rank_survives(1, 4, 0.5, None));
/// assert!(!rank_survives(2, 4, 0.5, None));
/// assert!(rank_survives(1, 4, 0.3, Some(0.1)));
/// assert!(!rank_survives(1, 4, 0.3, Some(0.3)));
/// ```
#[inline(always)]
#[must_use]
pub fn rank_survives(rank: u32, levels: u32, coverage: f32, offset: Option<f32>) -> bool {
    let scaled = coverage * levels as f32;
    match offset {
        None => scaled.round() as u32 > rank,
        Some(t) => rank as f32 + t < scaled,
    }
}

/// Rang du pixel dans la grille 2×2×2 pour la tranche `slice`.
#[inline(always)]
#[must_use]
pub fn grid3d_rank(x: u32, y: u32, slice: u32) -> u32 {
    u32::from(GRID_2X2X2[(slice & 1) as usize][(y & 1) as usize][(x & 1) as usize])
}

/// Décision en grille : niveau `round(c·N²)`, survie si le niveau dépasse
/// le rang du pixel dans l'entrée `entry` de la table.
///
/// # Example
/// ```
/// use sd_perm::table::PermutationTable;
/// use sd_dither::grid::grid_decide;
/// let table = PermutationTable::seed_only(2).unwrap();
/// let survivors = (0..2).flat_map(|y| (0..2).map(move |x| (x, y)))
///     .filter(|&(x, y)| grid_decide(&table, 0, x, y, 0.5))
///     .count();
/// assert_eq!(survivors, 2);
/// ```
#[inline(always)]
#[must_use]
pub fn grid_decide(table: &PermutationTable, entry: u32, x: u32, y: u32, coverage: f32) -> bool {
    grid_decide_with(table, entry, x, y, coverage, None)
}

/// [`grid_decide`] with an optional rank offset in [0, 1).
#[inline(always)]
#[must_use]
pub fn grid_decide_with(table: &PermutationTable, entry: u32, x: u32, y: u32, coverage: f32, offset: Option<f32>) -> bool {
    let n = table.n() as u32;
    rank_survives(u32::from(table.value_at(entry, x, y)), n * n, coverage, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_survivors_equal_rounded_level() {
        let settings = SearchSettings {
            max_results: 20,
            ..SearchSettings::default()
        };
        let table = PermutationTable::build(3, &settings).unwrap();
        for entry in 0..table.len() as u32 {
            for c in [0.0f32, 0.1, 0.34, 0.5, 0.9, 1.0] {
                let expected = (c * 9.0).round() as usize;
                // Any 3×3 window of the tiled pattern holds each rank once.
                let count = (4..7)
                    .flat_map(|y| (5..8).map(move |x| (x, y)))
                    .filter(|&(x, y)| grid_decide(&table, entry, x, y, c))
                    .count();
                assert_eq!(count, expected, "entry {entry} c {c}");
            }
        }
    }

    #[test]
    fn temporal_grid_tiles_are_exact_over_two_frames() {
        let mut all: Vec<u32> = (0..2)
            .flat_map(|z| (0..2).flat_map(move |y| (0..2).map(move |x| grid3d_rank(x, y, z))))
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..8).collect::<Vec<_>>());

        for c in [0.0f32, 0.125, 0.25, 0.5, 0.75, 1.0] {
            let level = (c * 8.0).round() as usize;
            let total: usize = (0..2)
                .map(|z| {
                    (0..2)
                        .flat_map(|y| (0..2).map(move |x| (x, y)))
                        .filter(|&(x, y)| rank_survives(grid3d_rank(x, y, z), 8, c, None))
                        .count()
                })
                .sum();
            assert_eq!(total, level, "c {c}");
        }
        // Half coverage: every pixel survives exactly once per frame pair.
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let n = (0..2).filter(|&z| rank_survives(grid3d_rank(x, y, z), 8, 0.5, None)).count();
            assert_eq!(n, 1);
        }
    }

    #[test]
    fn rank_offset_dithers_between_levels() {
        // c·levels = 1.5: rank 1 survives for offsets below 0.5 only.
        let survived = (0..100)
            .filter(|i| rank_survives(1, 4, 0.375, Some(*i as f32 / 100.0)))
            .count();
        assert_eq!(survived, 50);
        assert!(rank_survives(3, 4, 1.0, Some(0.999)));
        assert!(!rank_survives(0, 4, 0.0, Some(0.0)));
    }

    #[test]
    fn table_set_slots() {
        let mut set = TableSet::default();
        assert!(set.get(3).is_none());
        set.ensure(&[2, 3], &SearchSettings::default()).unwrap();
        assert!(set.contains(2) && set.contains(3) && !set.contains(4));
        assert!(set.get(5).is_none());
        set.clear();
        assert!(!set.contains(2));
    }
}
