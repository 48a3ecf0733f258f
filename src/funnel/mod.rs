//! 漏斗模块：根据转化与点击数据推导有序的漏斗阶段。
//!
//! # Funnel Projection
//!
//! Turns the raw conversion and click-track records fetched from RedTrack into
//! an ordered list of funnel stages with volumes and stage-over-stage
//! percentages.
//!
//! ## Rules
//!
//! - Stages are evaluated in the order of their [`StageDefinition`]s.
//! - A stage whose aggregate is zero is omitted, never shown as zero.
//! - Each stage's percentage is taken against the nearest *included*
//!   predecessor, so gaps left by omitted stages are skipped.
//!
//! ```rust
//! use vmetrics::funnel::{ConversionEvent, FunnelProjector, TrackEvent};
//!
//! let tracks = vec![TrackEvent { clicks: 100 }];
//! let conversions = vec![ConversionEvent {
//!     event_type: "conversion".into(),
//!     status: "APPROVED".into(),
//!     ..Default::default()
//! }];
//! let result = FunnelProjector::default().project(&conversions, &tracks);
//! assert_eq!(result.total_stages, 2);
//! assert_eq!(result.total_conversion_rate, 1.0);
//! ```

mod events;
mod projector;
mod stage;

pub use events::{ConversionEvent, TrackEvent};
pub use projector::{FunnelInput, FunnelProjector, FunnelResult};
pub use stage::{default_stages, FunnelStage, StageDefinition};
