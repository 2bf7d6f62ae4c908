pub mod adapter;
pub mod blend_engine;
pub mod coalesce;
pub mod commands;
pub mod engine; // LiveEngine lives here
pub mod export;
pub mod mixer;
pub mod model_worker;
pub mod nodes;
pub mod offline;
pub mod output;
pub mod recorder;
pub mod renderer;
pub mod resampler;
pub mod sequencer;
pub mod store;
pub mod transport;

// Re-exports
pub use adapter::{DrumModel, GridModel, InterpolationAdapter};
pub use blend_engine::{BlendEngine, ModelState};
pub use commands::EngineCommand;
pub use engine::LiveEngine;
pub use export::AudioBuffer;
pub use offline::OfflineRenderer;
pub use renderer::{HybridRenderer, Provenance, RenderRequest, RenderResult, SilenceGuard};
pub use store::PatternStore;

#[cfg(test)]
mod tests_blend;
#[cfg(test)]
mod tests_render;
