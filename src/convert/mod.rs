//! Conversion of staged features into contributions
//!
//! - [`coercion`]: value coercion to category field types
//! - [`state`]: conversion run states
//! - [`engine`]: the per-feature conversion loop

pub mod coercion;
pub mod engine;
pub mod state;

pub use coercion::{CoercionError, coerce};
pub use engine::{
    ConversionEngine, ConversionError, ConversionSummary, FeatureError, FeatureFailure,
    FeatureSelection,
};
pub use state::{ConversionState, StateError};
