//! HTTP API handlers for formcheck-ai

pub mod analysis;
pub mod health;
pub mod jobs;
pub mod overlay;
pub mod player;
pub mod sse;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use overlay::overlay_routes;
pub use player::player_routes;
pub use sse::{event_stream, overlay_stream};
