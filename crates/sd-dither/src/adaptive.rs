//! Sélection continue de la taille de matrice.
//!
//! Le sélecteur `s` ∈ [0, 1] est la moyenne pondérée de trois termes :
//! profondeur normalisée, fréquence de texture et un terme alpha qui vaut 1 à
//! mi-transparence et 0 aux extrêmes. La taille continue `4 - 2s` est
//! arrondie stochastiquement entre ses deux tailles entières voisines :
//! loin, détaillé ou à mi-alpha, on passe aux petites matrices.

use sd_core::Fragment;
use sd_core::config::{AdaptiveDebugView, AdaptiveWeights};

/// Termes normalisés et sélecteur d'un fragment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveSample {
    /// `depth / depth_far`, clamped.
    pub depth: f32,
    /// `frequency · frequency_scale`, clamped.
    pub frequency: f32,
    /// `1 - |2c - 1|`.
    pub alpha: f32,
    /// Weighted mean of the three terms.
    pub selector: f32,
}

impl AdaptiveSample {
    /// Evaluate the selector for one fragment.
    ///
    /// # Example
    /// ```
    /// use sd_core::Fragment;
    /// use sd_core::config::AdaptiveWeights;
    /// use sd_dither::adaptive::AdaptiveSample;
    /// let s = AdaptiveSample::evaluate(&AdaptiveWeights::default(), &Fragment::with_coverage(1.0));
    /// assert_eq!(s.selector, 0.0);
    /// assert_eq!(s.matrix_size(), 4.0);
    /// ```
    #[must_use]
    pub fn evaluate(weights: &AdaptiveWeights, fragment: &Fragment) -> Self {
        let c = fragment.coverage.clamp(0.0, 1.0);
        let depth = fragment
            .depth
            .map_or(0.0, |d| (d / weights.depth_far.max(1e-3)).clamp(0.0, 1.0));
        let frequency = fragment
            .frequency
            .map_or(0.0, |f| (f * weights.frequency_scale).clamp(0.0, 1.0));
        let alpha = 1.0 - (2.0 * c - 1.0).abs();

        let total = weights.depth_weight + weights.frequency_weight + weights.alpha_weight;
        let selector = if total > 0.0 {
            ((weights.depth_weight * depth + weights.frequency_weight * frequency + weights.alpha_weight * alpha)
                / total)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            depth,
            frequency,
            alpha,
            selector,
        }
    }

    /// Continuous matrix side in [2, 4].
    #[inline(always)]
    #[must_use]
    pub fn matrix_size(&self) -> f32 {
        4.0 - 2.0 * self.selector
    }

    /// Côté entier : plancher ou plafond, avec probabilité la partie fractionnaire.
    #[inline]
    #[must_use]
    pub fn pick_size(&self, u: f32) -> usize {
        let size = self.matrix_size();
        let lower = size.floor();
        let n = if u < size - lower { lower + 1.0 } else { lower };
        (n as usize).clamp(2, 4)
    }
}

/// Couleur de debug du canal demandé, `None` si la vue est désactivée.
#[must_use]
pub fn debug_colour(view: AdaptiveDebugView, sample: &AdaptiveSample, chosen_size: usize) -> Option<(u8, u8, u8)> {
    let grey = |v: f32| {
        let g = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (g, g, g)
    };
    match view {
        AdaptiveDebugView::Off => None,
        AdaptiveDebugView::MatrixSize => Some(match chosen_size {
            2 => (255, 64, 64),
            3 => (64, 255, 64),
            _ => (64, 64, 255),
        }),
        AdaptiveDebugView::Depth => Some(grey(sample.depth)),
        AdaptiveDebugView::Frequency => Some(grey(sample.frequency)),
        AdaptiveDebugView::Alpha => Some(grey(sample.alpha)),
        AdaptiveDebugView::Combined => Some(grey(sample.selector)),
    }
}
