//! Seuil par échantillon de jitter.
//!
//! L'indice d'échantillon de la frame est classé à travers la permutation de
//! la matrice de tramage 4×4 ; sur `S` frames consécutives chaque rang
//! 0..S apparaît une fois, donc un pixel survit exactement `round(c·S)` fois.

use sd_perm::matrix::BAYER_4X4;

/// Ordre de parcours des 16 échantillons (matrice 4×4 lue en ligne).
pub const JITTER_PERMUTE_4X4: [u8; 16] = [0, 10, 2, 8, 5, 15, 7, 13, 1, 11, 3, 9, 4, 14, 6, 12];

/// Rang de l'échantillon `sample` parmi les `count` premiers.
///
/// Pour `count < 16` la permutation est restreinte aux `count` premiers
/// échantillons en gardant leur ordre relatif.
///
/// # Example
/// ```
/// use sd_dither::jitter::sample_rank;
/// let mut ranks: Vec<u32> = (0..6).map(|s| sample_rank(s, 6)).collect();
/// ranks.sort_unstable();
/// assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
/// ```
#[inline]
#[must_use]
pub fn sample_rank(sample: u32, count: u32) -> u32 {
    let count = count.clamp(1, 16) as usize;
    let sample = sample as usize % count;
    let key = JITTER_PERMUTE_4X4[sample];
    JITTER_PERMUTE_4X4[..count]
        .iter()
        .filter(|&&k| k < key)
        .count() as u32
}

/// Décision du mode per-jitter.
///
/// Le décalage par pixel (rang de Bayer 4×4) désynchronise les pixels voisins.
#[inline]
#[must_use]
pub fn jitter_decide(x: u32, y: u32, frame: u32, coverage: f32, count: u32) -> bool {
    let count = count.clamp(1, 16);
    let level = (coverage * count as f32).round() as u32;
    let offset = u32::from(BAYER_4X4[(y % 4) as usize][(x % 4) as usize]);
    let sample = frame.wrapping_add(offset) % count;
    sample_rank(sample, count) < level
}
