use crate::error::DitherError;

/// Clé spatio-temporelle d'un fragment : position pixel et index de frame.
///
/// # Example
/// ```
/// use sd_core::fragment::PixelKey;
/// let key = PixelKey::new(3, 7, 42);
/// assert_eq!((key.x, key.y, key.frame), (3, 7, 42));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelKey {
    /// Pixel column.
    pub x: u32,
    /// Pixel row.
    pub y: u32,
    /// Frame index.
    pub frame: u32,
}

impl PixelKey {
    /// Build a key.
    #[inline(always)]
    #[must_use]
    pub fn new(x: u32, y: u32, frame: u32) -> Self {
        Self { x, y, frame }
    }
}

/// Signaux fournis par le pipeline de shading pour un fragment transparent.
///
/// # Example
/// ```
/// use sd_core::fragment::Fragment;
/// let f = Fragment::with_coverage(0.25);
/// assert!((f.coverage - 0.25).abs() < f32::EPSILON);
/// assert!(f.depth.is_none());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    /// Coverage/alpha in [0, 1]. Values outside are clamped at evaluation.
    pub coverage: f32,
    /// Instance/object identifier.
    pub object_id: u32,
    /// Material index, also the bit index in the whitelist.
    pub material_id: u32,
    /// Linear view depth, when the host provides it.
    pub depth: Option<f32>,
    /// Texture-derivative frequency estimate, when the host provides it.
    pub frequency: Option<f32>,
}

impl Default for Fragment {
    fn default() -> Self {
        Self {
            coverage: 1.0,
            object_id: 0,
            material_id: 0,
            depth: None,
            frequency: None,
        }
    }
}

impl Fragment {
    /// Fragment with the given coverage and every other signal at its default.
    #[must_use]
    pub fn with_coverage(coverage: f32) -> Self {
        Self {
            coverage,
            ..Self::default()
        }
    }
}

/// Buffer de fragments d'une frame. Pré-alloué, row-major.
///
/// # Example
/// ```
/// use sd_core::fragment::FragmentBuffer;
/// let fb = FragmentBuffer::new(8, 4).unwrap();
/// assert_eq!(fb.fragments.len(), 32);
/// ```
#[derive(Clone, Debug)]
pub struct FragmentBuffer {
    /// Fragments, row-major.
    pub fragments: Vec<Fragment>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FragmentBuffer {
    /// Crée un buffer pré-alloué de fragments opaques.
    ///
    /// # Errors
    /// Returns [`DitherError::InvalidDimensions`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, DitherError> {
        if width == 0 || height == 0 {
            return Err(DitherError::InvalidDimensions { width, height });
        }
        Ok(Self {
            fragments: vec![Fragment::default(); (width as usize) * (height as usize)],
            width,
            height,
        })
    }

    /// Accès au fragment (x, y).
    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> &Fragment {
        debug_assert!(x < self.width && y < self.height, "fragment out of bounds");
        &self.fragments[(y * self.width + x) as usize]
    }

    /// Mutable access to fragment (x, y).
    #[inline(always)]
    pub fn get_mut(&mut self, x: u32, y: u32) -> &mut Fragment {
        debug_assert!(x < self.width && y < self.height, "fragment out of bounds");
        &mut self.fragments[(y * self.width + x) as usize]
    }

    /// Number of pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// `true` if the buffer holds no pixel (never the case once constructed).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Sortie d'une frame : survie par fragment, plus le canal debug optionnel.
///
/// # Example
/// ```
/// use sd_core::fragment::DecisionBuffer;
/// let mut out = DecisionBuffer::new(4, 4);
/// out.survive[0] = true;
/// assert_eq!(out.survivor_count(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct DecisionBuffer {
    /// Survive/reject per pixel, row-major.
    pub survive: Vec<bool>,
    /// False-colour debug value per pixel, (0,0,0) when unused.
    pub debug: Vec<(u8, u8, u8)>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl DecisionBuffer {
    /// Crée une sortie pré-allouée, tout rejeté.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let n = (width as usize) * (height as usize);
        Self {
            survive: vec![false; n],
            debug: vec![(0, 0, 0); n],
            width,
            height,
        }
    }

    /// Reallocate if the dimensions changed.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }

    /// Number of surviving fragments.
    #[must_use]
    pub fn survivor_count(&self) -> usize {
        self.survive.iter().filter(|s| **s).count()
    }

    /// Fraction of surviving fragments.
    #[must_use]
    pub fn survival_rate(&self) -> f64 {
        if self.survive.is_empty() {
            return 0.0;
        }
        self.survivor_count() as f64 / self.survive.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimension_is_rejected() {
        assert_eq!(
            FragmentBuffer::new(0, 4).unwrap_err(),
            DitherError::InvalidDimensions { width: 0, height: 4 }
        );
    }

    #[test]
    fn fragment_indexing_is_row_major() {
        let mut fb = FragmentBuffer::new(3, 2).unwrap();
        fb.get_mut(2, 1).coverage = 0.5;
        assert!((fb.fragments[5].coverage - 0.5).abs() < f32::EPSILON);
        assert!((fb.get(2, 1).coverage - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn decision_resize_reallocates() {
        let mut out = DecisionBuffer::new(2, 2);
        out.survive[3] = true;
        out.resize(2, 2);
        assert_eq!(out.survivor_count(), 1);
        out.resize(3, 3);
        assert_eq!(out.survive.len(), 9);
        assert_eq!(out.survivor_count(), 0);
    }
}
