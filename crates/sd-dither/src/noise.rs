//! Sources de seuils pour les modes bruit, hash grid, fractal et STBN.
//!
//! Une source est une texture répétée en tuile, lue au point (pas de
//! filtrage), dont les valeurs sont dans [0, 1).

use std::path::Path;

use anyhow::{Context, Result};
use sd_core::config::NoisePattern;
use sd_perm::matrix::{BAYER_4X4, BAYER_8X8};

use crate::hash::{R2_ALPHA, fmix, fract, hash2, hash3, uniform};

/// Nombre de tranches temporelles du bruit spatio-temporel.
pub const STBN_SLICES: u32 = 64;

/// Texture de seuils lue par les modes à base de bruit.
///
/// # Example
/// ```
/// use sd_dither::noise::NoiseSource;
///
/// struct Flat;
/// impl NoiseSource for Flat {
///     fn sample(&self, _x: u32, _y: u32) -> f32 { 0.5 }
///     fn dimensions(&self) -> (u32, u32) { (1, 1) }
/// }
/// assert_eq!(Flat.sample_slice(3, 4, 7), 0.5);
/// ```
pub trait NoiseSource: Send + Sync {
    /// Threshold in [0, 1) at a texel; coordinates wrap on the tile.
    fn sample(&self, x: u32, y: u32) -> f32;

    /// Tile size in texels.
    fn dimensions(&self) -> (u32, u32);

    /// Tranche temporelle `slice` : la tuile décalée d'un pas R2 par tranche.
    fn sample_slice(&self, x: u32, y: u32, slice: u32) -> f32 {
        let (w, h) = self.dimensions();
        let s = slice as f32;
        let ox = (fract(s * R2_ALPHA.0) * w as f32) as u32;
        let oy = (fract(s * R2_ALPHA.1) * h as f32) as u32;
        self.sample(x.wrapping_add(ox), y.wrapping_add(oy))
    }
}

/// Bruit calculé à la volée, sans texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProceduralNoise {
    pattern: NoisePattern,
    seed: u32,
}

impl ProceduralNoise {
    /// Procedural stand-in for the given texture pattern.
    #[must_use]
    pub fn new(pattern: NoisePattern, seed: u32) -> Self {
        Self { pattern, seed }
    }

    /// Pattern this source imitates.
    #[must_use]
    pub fn pattern(&self) -> NoisePattern {
        self.pattern
    }

    #[inline(always)]
    fn white(&self, x: u32, y: u32) -> f32 {
        uniform(hash3(x, y, self.seed))
    }

    /// Interleaved gradient noise mixed with a coarse hash.
    #[inline(always)]
    fn blue(&self, x: u32, y: u32) -> f32 {
        let xo = x.wrapping_add(self.seed.wrapping_mul(5));
        let yo = y.wrapping_add(self.seed.wrapping_mul(7));
        let ign = fract(52.982_918 * fract(0.067_110_56 * xo as f32 + 0.005_837_15 * yo as f32));
        let coarse = uniform(hash3(x >> 1, y >> 1, self.seed.wrapping_add(1337)));
        fract(ign * 0.75 + coarse * 0.25 + 0.5)
    }

    #[inline(always)]
    fn bayer(x: u32, y: u32) -> f32 {
        (f32::from(BAYER_8X8[(y % 8) as usize][(x % 8) as usize]) + 0.5) / 64.0
    }

    /// Value noise on an 8-texel lattice, smoothstep interpolated.
    fn perlin(&self, x: u32, y: u32) -> f32 {
        const CELL: u32 = 8;
        let (cx, cy) = (x / CELL, y / CELL);
        let tx = smoothstep((x % CELL) as f32 / CELL as f32);
        let ty = smoothstep((y % CELL) as f32 / CELL as f32);
        let corner = |dx: u32, dy: u32| uniform(hash3(cx + dx, cy + dy, self.seed ^ 0x5bd1_e995));
        let top = corner(0, 0) + (corner(1, 0) - corner(0, 0)) * tx;
        let bottom = corner(0, 1) + (corner(1, 1) - corner(0, 1)) * tx;
        (top + (bottom - top) * ty).min(0.999_999)
    }

    /// Un échantillon jittéré par cellule 4×4, rangs de Bayer décalés par cellule.
    fn poisson(&self, x: u32, y: u32) -> f32 {
        let h = hash3(x / 4, y / 4, self.seed ^ 0x68e3_1da4);
        let (ox, oy) = (h & 3, (h >> 2) & 3);
        let rank = BAYER_4X4[((y + oy) % 4) as usize][((x + ox) % 4) as usize];
        (f32::from(rank) + uniform(fmix(h ^ hash2(x, y)))) / 16.0
    }
}

#[inline(always)]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

impl NoiseSource for ProceduralNoise {
    fn sample(&self, x: u32, y: u32) -> f32 {
        let (w, h) = self.dimensions();
        let (x, y) = (x % w, y % h);
        match self.pattern {
            NoisePattern::White => self.white(x, y),
            NoisePattern::Blue | NoisePattern::Blue64 => self.blue(x, y),
            NoisePattern::Bayer => Self::bayer(x, y),
            NoisePattern::BlueBayer => fract(Self::bayer(x, y) + self.blue(x >> 3, y >> 3)),
            NoisePattern::Poisson => self.poisson(x, y),
            NoisePattern::Perlin => self.perlin(x, y),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        match self.pattern {
            NoisePattern::Blue64 => (64, 64),
            _ => (1024, 1024),
        }
    }
}

/// Texture de bruit chargée depuis une image (canal de luminance).
pub struct TextureNoise {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl TextureNoise {
    /// Charge une texture de bruit (PNG, 8 ou 16 bits).
    ///
    /// # Errors
    /// Unreadable or undecodable file.
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Impossible de charger la texture de bruit {}", path.display()))?;
        let luma = img.to_luma16();
        let (width, height) = luma.dimensions();
        let values = luma
            .into_raw()
            .into_iter()
            .map(|v| (f32::from(v) + 0.5) / 65_536.0)
            .collect();
        log::info!("Texture de bruit {} : {width}x{height}", path.display());
        Self::from_values(values, width, height)
    }

    /// Wrap raw thresholds, row-major, each clamped to [0, 1).
    ///
    /// # Errors
    /// Zero dimension or a length that does not match.
    pub fn from_values(mut values: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || values.len() != (width as usize) * (height as usize) {
            anyhow::bail!(
                "Texture de bruit invalide : {width}x{height} pour {} valeurs",
                values.len()
            );
        }
        for v in &mut values {
            *v = v.clamp(0.0, 0.999_999);
        }
        Ok(Self {
            values,
            width,
            height,
        })
    }
}

impl NoiseSource for TextureNoise {
    #[inline(always)]
    fn sample(&self, x: u32, y: u32) -> f32 {
        let (x, y) = (x % self.width, y % self.height);
        self.values[(y * self.width + x) as usize]
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_over(src: &dyn NoiseSource, side: u32) -> f64 {
        let mut sum = 0.0f64;
        for y in 0..side {
            for x in 0..side {
                sum += f64::from(src.sample(x, y));
            }
        }
        sum / f64::from(side * side)
    }

    #[test]
    fn procedural_values_are_in_unit_range() {
        for pattern in [
            NoisePattern::White,
            NoisePattern::Blue,
            NoisePattern::Bayer,
            NoisePattern::BlueBayer,
            NoisePattern::Poisson,
            NoisePattern::Perlin,
            NoisePattern::Blue64,
        ] {
            let src = ProceduralNoise::new(pattern, 3);
            for y in 0..64 {
                for x in 0..64 {
                    let v = src.sample(x, y);
                    assert!((0.0..1.0).contains(&v), "{pattern:?} ({x},{y}) = {v}");
                }
            }
        }
    }

    #[test]
    fn flat_patterns_average_one_half() {
        for pattern in [NoisePattern::White, NoisePattern::Bayer, NoisePattern::Poisson] {
            let m = mean_over(&ProceduralNoise::new(pattern, 11), 128);
            assert!((m - 0.5).abs() < 0.02, "{pattern:?}: {m}");
        }
    }

    #[test]
    fn blue64_tiles_every_64_texels() {
        let src = ProceduralNoise::new(NoisePattern::Blue64, 1);
        assert_eq!(src.sample(3, 5), src.sample(67, 133));
    }

    #[test]
    fn slices_differ() {
        let src = ProceduralNoise::new(NoisePattern::White, 1);
        let a: Vec<f32> = (0..16).map(|x| src.sample_slice(x, 0, 1)).collect();
        let b: Vec<f32> = (0..16).map(|x| src.sample_slice(x, 0, 2)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn texture_from_values_wraps() {
        let tex = TextureNoise::from_values(vec![0.0, 0.25, 0.5, 2.0], 2, 2).unwrap();
        assert_eq!(tex.sample(3, 0), 0.25);
        assert_eq!(tex.sample(0, 3), 0.5);
        assert!(tex.sample(1, 1) < 1.0);
        assert!(TextureNoise::from_values(vec![0.0; 3], 2, 2).is_err());
    }

    #[test]
    fn texture_loads_from_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.png");
        let img = image::GrayImage::from_fn(4, 4, |x, y| image::Luma([((x + 4 * y) * 16) as u8]));
        img.save(&path).unwrap();
        let tex = TextureNoise::load(&path).unwrap();
        assert_eq!(tex.dimensions(), (4, 4));
        assert!(tex.sample(0, 0) < tex.sample(1, 0));
        assert!(tex.sample(3, 3) > 0.9);
    }
}
