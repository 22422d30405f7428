/// Configuration, errors and shared per-fragment types for stochastic-dither.
///
/// This crate holds everything the permutation search, the dither policy and
/// the CLI agree on: the TOML-backed [`DitherConfig`], the [`DitherError`]
/// enum, the fragment/decision buffers exchanged with the host, and the
/// packed material whitelist.

pub mod config;
pub mod error;
pub mod fragment;
pub mod whitelist;

pub use config::DitherConfig;
pub use error::DitherError;
pub use fragment::{DecisionBuffer, Fragment, FragmentBuffer, PixelKey};
pub use whitelist::MaterialWhitelist;
