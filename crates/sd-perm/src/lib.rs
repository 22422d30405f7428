/// Permutation matrices used as per-pixel dither thresholds.
///
/// [`score`] rates a matrix on the N×N torus, [`search`] finds the best ones
/// (exhaustive for 2×2 and 3×3, simulated annealing for 4×4), and [`table`]
/// packs the ranked result into 32-bit words. [`cache`] and [`job`] keep the
/// search out of the frame loop.
pub mod cache;
pub mod job;
pub mod matrix;
pub mod score;
pub mod search;
pub mod table;

pub use matrix::PermutationMatrix;
pub use search::{ScoreBand, Scored, search};
pub use table::PermutationTable;
