//! Overlay core
//!
//! - `timestamp`: feedback time expressions → intervals
//! - `activation`: which event is active at the playhead
//! - `ranking`: most urgent events for the summary
//! - `text`: width-bounded truncation
//! - `scheduler`: pure per-frame composition
//! - `driver`: cadence loop publishing frames

pub mod activation;
pub mod driver;
pub mod ranking;
pub mod scheduler;
pub mod text;
pub mod timestamp;

pub use activation::{select_active, ActivationSource, ActiveEvent, SelectionOverride};
pub use driver::RenderDriver;
pub use ranking::{rank_top, RankedEvent};
pub use scheduler::{render_tick, OverlayConfig, RenderDescription, RenderInput, Viewport};
pub use text::{MonospaceMeasure, TextMeasure};
pub use timestamp::{IntervalEnd, TimeInterval, TimestampError};
