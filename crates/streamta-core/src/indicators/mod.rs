//! Technical indicators for streaming bar-by-bar computation.
//!
//! Every family implements the `Indicator` trait (see `indicator_trait`):
//! `update(bar)` in O(1), `value()` returning a scalar or a fixed-shape
//! composite, and `warmup_period()`/`is_warmed_up()` gating when `value()`
//! is guaranteed non-null. The `registry` module maps a protocol-level
//! type tag (`"ema"`, `"macd"`, …) to a concrete boxed instance so callers
//! never hand-wire constructors.

pub mod indicator_trait;
pub mod momentum;
pub mod other;
pub mod registry;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use indicator_trait::{Indicator, IndicatorRequirement, Value};
pub use registry::{build as build_indicator, supported_types};
