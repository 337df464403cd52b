//! Reference modules that exercise the recommendation protocol.

pub mod closure;
pub mod decay;

pub use closure::{TriadicClosureConfig, TriadicClosureModule};
pub use decay::{EdgeDecayConfig, EdgeDecayModule};
