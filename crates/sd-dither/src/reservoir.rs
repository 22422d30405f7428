//! Historique temporel par pixel, en double buffer.
//!
//! Un buffer est lu (frame précédente), l'autre écrit (frame courante). Les
//! rôles s'échangent une seule fois par frame, et seulement si le mode
//! réservoir était actif ; sinon l'historique reste figé.

/// Enregistrement de réservoir décodé.
///
/// Bit 0 : dernière décision. Bits 1-7 : longueur de la série de cette
/// décision (saturée à 127). Bits 8-31 : erreur de couverture accumulée,
/// signée, en virgule fixe 2⁻¹⁶.
///
/// # Example
/// ```
/// use sd_dither::reservoir::ReservoirRecord;
/// let r = ReservoirRecord { outcome: true, run: 3, error: -0.25 };
/// assert_eq!(ReservoirRecord::unpack(r.pack()), r);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReservoirRecord {
    /// Last survive/reject decision.
    pub outcome: bool,
    /// Consecutive frames with that decision.
    pub run: u8,
    /// Accumulated `coverage - outcome`.
    pub error: f32,
}

/// Plus longue série représentable.
pub const MAX_RUN: u8 = 127;

const ERROR_SCALE: f32 = 65_536.0;
const ERROR_MAX: i32 = (1 << 23) - 1;

impl ReservoirRecord {
    /// Encode into the 32-bit history word.
    #[must_use]
    pub fn pack(&self) -> u32 {
        let fixed = (self.error * ERROR_SCALE)
            .round()
            .clamp(-(ERROR_MAX as f32) - 1.0, ERROR_MAX as f32) as i32;
        ((fixed as u32) << 8) | (u32::from(self.run.min(MAX_RUN)) << 1) | u32::from(self.outcome)
    }

    /// Decode a history word.
    #[must_use]
    pub fn unpack(word: u32) -> Self {
        Self {
            outcome: word & 1 != 0,
            run: ((word >> 1) & 0x7F) as u8,
            error: ((word as i32) >> 8) as f32 / ERROR_SCALE,
        }
    }
}

/// Deux buffers u32 de même taille et l'index du buffer lu.
///
/// # Example
/// ```
/// use sd_dither::reservoir::TemporalReservoir;
/// let mut r = TemporalReservoir::default();
/// assert!(r.ensure_resolution(4, 4));
/// assert!(!r.is_valid());
/// r.end_frame(true);
/// assert!(r.is_valid());
/// assert_eq!(r.read_index(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct TemporalReservoir {
    buffers: [Vec<u32>; 2],
    width: u32,
    height: u32,
    read_index: usize,
    valid: bool,
}

impl TemporalReservoir {
    /// (Re)allocate both buffers if the resolution changed.
    ///
    /// Returns `true` when an allocation happened; history is then invalid.
    pub fn ensure_resolution(&mut self, width: u32, height: u32) -> bool {
        let len = (width as usize) * (height as usize);
        if self.width == width && self.height == height && self.buffers[0].len() == len {
            return false;
        }
        self.buffers = [vec![0; len], vec![0; len]];
        self.width = width;
        self.height = height;
        self.read_index = 0;
        self.valid = false;
        log::debug!("Réservoir temporel alloué : {width}x{height}");
        true
    }

    /// Forget the history (scene change).
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// `true` once a full frame has been written since allocation or reset.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Index (0 or 1) of the buffer read this frame.
    #[must_use]
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Buffer dimensions.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// History of the previous frame.
    #[must_use]
    pub fn read_buffer(&self) -> &[u32] {
        &self.buffers[self.read_index]
    }

    /// Record at a pixel, `None` without valid history.
    #[must_use]
    pub fn history(&self, x: u32, y: u32) -> Option<ReservoirRecord> {
        if !self.valid || x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize) * (self.width as usize) + x as usize;
        Some(ReservoirRecord::unpack(self.buffers[self.read_index][i]))
    }

    /// Read buffer and write buffer, borrowed together.
    pub fn split(&mut self) -> (&[u32], &mut [u32]) {
        let [a, b] = &mut self.buffers;
        if self.read_index == 0 {
            (a.as_slice(), b.as_mut_slice())
        } else {
            (b.as_slice(), a.as_mut_slice())
        }
    }

    /// Fin de frame : échange lecture/écriture si le mode réservoir a tourné.
    pub fn end_frame(&mut self, reservoir_active: bool) {
        if reservoir_active {
            self.read_index ^= 1;
            self.valid = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_packs_into_documented_bits() {
        let r = ReservoirRecord {
            outcome: true,
            run: 5,
            error: 1.0,
        };
        assert_eq!(r.pack(), (65_536 << 8) | (5 << 1) | 1);
    }

    #[test]
    fn negative_error_sign_extends() {
        let r = ReservoirRecord {
            outcome: false,
            run: 127,
            error: -1.5,
        };
        let back = ReservoirRecord::unpack(r.pack());
        assert_eq!(back, r);
    }

    #[test]
    fn run_saturates() {
        let r = ReservoirRecord {
            outcome: false,
            run: 200,
            error: 0.0,
        };
        assert_eq!(ReservoirRecord::unpack(r.pack()).run, MAX_RUN);
    }

    #[test]
    fn lifecycle() {
        let mut r = TemporalReservoir::default();
        assert!(r.ensure_resolution(8, 2));
        assert!(!r.is_valid());
        assert_eq!(r.history(0, 0), None);
        assert!(!r.ensure_resolution(8, 2));

        // Frame without the reservoir mode: history frozen.
        r.end_frame(false);
        assert!(!r.is_valid());
        assert_eq!(r.read_index(), 0);

        let (_, write) = r.split();
        write[3] = ReservoirRecord {
            outcome: true,
            run: 1,
            error: 0.5,
        }
        .pack();
        r.end_frame(true);
        assert!(r.is_valid());
        assert_eq!(r.read_index(), 1);
        assert_eq!(r.history(3, 0).map(|h| h.outcome), Some(true));

        r.invalidate();
        assert_eq!(r.history(3, 0), None);

        assert!(r.ensure_resolution(4, 4));
        assert!(!r.is_valid());
        assert_eq!(r.read_index(), 0);
    }
}
