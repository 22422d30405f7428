//! Hachages entiers sans état pour les décisions par pixel.
//!
//! Tout est déterministe en (x, y, frame, objet) : deux exécutions de la même
//! frame donnent exactement la même image.

use sd_core::config::ObjectHash;

/// Conjugué du nombre d'or, décalage temporel des seuils de bruit.
pub const GOLDEN_CONJUGATE: f32 = 0.618_034;

/// Constantes de la séquence R2 (1/φ₂ et 1/φ₂²).
pub const R2_ALPHA: (f32, f32) = (0.754_877_7, 0.569_840_3);

/// PCG output permutation on a single word.
///
/// # Example
/// ```
/// use sd_dither::hash::pcg;
/// assert_ne!(pcg(0), pcg(1));
/// ```
#[inline(always)]
#[must_use]
pub fn pcg(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Murmur3 finaliser.
#[inline(always)]
#[must_use]
pub fn fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// Hash of a pixel position.
#[inline(always)]
#[must_use]
pub fn hash2(x: u32, y: u32) -> u32 {
    fmix(x.wrapping_mul(1_664_525).wrapping_add(pcg(y)))
}

/// Hash of a pixel position and a frame.
#[inline(always)]
#[must_use]
pub fn hash3(x: u32, y: u32, z: u32) -> u32 {
    pcg(hash2(x, y) ^ pcg(z))
}

/// Hash of a pixel position, a frame and an object signal.
#[inline(always)]
#[must_use]
pub fn hash4(x: u32, y: u32, z: u32, w: u32) -> u32 {
    pcg(hash3(x, y, z) ^ fmix(w.wrapping_add(0x9e37_79b9)))
}

/// Uniforme dans [0, 1) à partir des 24 bits de poids fort.
///
/// # Example
/// ```
/// use sd_dither::hash::uniform;
/// assert_eq!(uniform(0), 0.0);
/// assert!(uniform(u32::MAX) < 1.0);
/// ```
#[inline(always)]
#[must_use]
pub fn uniform(h: u32) -> f32 {
    (h >> 8) as f32 * (1.0 / 16_777_216.0)
}

/// Signal de décorrélation entre surfaces superposées.
#[inline(always)]
#[must_use]
pub fn object_signal(kind: ObjectHash, object_id: u32, material_id: u32) -> u32 {
    match kind {
        ObjectHash::None => 0,
        ObjectHash::Instance => pcg(object_id),
        ObjectHash::Material => pcg(material_id),
        ObjectHash::InstanceMaterial => pcg(object_id ^ pcg(material_id)),
    }
}

/// Fractional part in [0, 1), also for negative inputs.
#[inline(always)]
#[must_use]
pub fn fract(v: f32) -> f32 {
    let f = v - v.floor();
    // -1e-9 - (-1.0) rounds to 1.0 in f32.
    if f >= 1.0 { 0.0 } else { f }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_roughly_flat() {
        let mut bins = [0u32; 10];
        for i in 0..100_000u32 {
            let u = uniform(hash3(i % 317, i / 317, 5));
            bins[(u * 10.0) as usize] += 1;
        }
        for b in bins {
            assert!((9_000..11_000).contains(&b), "{bins:?}");
        }
    }

    #[test]
    fn object_signal_modes() {
        assert_eq!(object_signal(ObjectHash::None, 4, 9), 0);
        assert_eq!(object_signal(ObjectHash::Instance, 4, 9), pcg(4));
        assert_eq!(object_signal(ObjectHash::Material, 4, 9), pcg(9));
        assert_ne!(
            object_signal(ObjectHash::InstanceMaterial, 4, 9),
            object_signal(ObjectHash::InstanceMaterial, 9, 4)
        );
    }

    #[test]
    fn fract_wraps_negatives() {
        assert!((fract(-0.25) - 0.75).abs() < 1e-6);
        assert!((fract(2.5) - 0.5).abs() < 1e-6);
    }
}
