/// Per-pixel stochastic dither decisions for V-buffer transparency.
///
/// [`policy`] decides for a single fragment whether it survives, from its
/// coverage and the active [`mode::DitherMode`]. [`pass`] runs that policy over
/// a whole frame in parallel and owns the state kept between frames: the
/// permutation tables, the temporal reservoir and the frame counter.
pub mod adaptive;
pub mod grid;
pub mod hash;
pub mod jitter;
pub mod mode;
pub mod noise;
pub mod pass;
pub mod policy;
pub mod reservoir;
pub mod ris;
pub mod taa;

pub use mode::DitherMode;
pub use noise::{NoiseSource, ProceduralNoise, TextureNoise};
pub use pass::{DitherPass, FrameStats};
pub use policy::{DitherDecision, DitherPolicy};
pub use reservoir::TemporalReservoir;
