//! Turns pointer positions into blended patterns.
//!
//! Local blending is applied synchronously. When the model is ready and the
//! corner latents are cached, a position is instead sent to the model worker,
//! which coalesces bursts into one decode. Results come back through `poll` or
//! `pump` and are applied only if no newer request has been made since.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use beatblend_shared::{
    local_blend, BlendConfig, BlendPosition, Corner, CornerWeights, DrumTrack, ModelError, Pattern,
};
use tracing::{debug, info, warn};

use crate::adapter::{CornerLatents, DrumModel, InterpolationAdapter, LatentVector};
use crate::model_worker::{ModelEvent, ModelJob, ModelWorker};
use crate::store::PatternStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    /// Terminal for the session.
    Disabled,
}

impl ModelState {
    pub fn begin_loading(self) -> Self {
        match self {
            ModelState::Unloaded => ModelState::Loading,
            other => other,
        }
    }

    pub fn load_finished(self, ok: bool) -> Self {
        match (self, ok) {
            (ModelState::Loading, true) => ModelState::Ready,
            (ModelState::Loading, false) => ModelState::Disabled,
            (other, _) => other,
        }
    }

    pub fn fail(self) -> Self {
        ModelState::Disabled
    }
}

pub struct BlendEngine {
    store: PatternStore,
    config: BlendConfig,
    position: BlendPosition,
    state: ModelState,
    assisted: bool,
    worker: Option<ModelWorker>,
    /// Latents keyed by the corner generation they were computed for
    latents: Option<(u64, CornerLatents)>,
    encode_pending: Option<u64>,
    /// Sequence number of the newest pattern request
    seq: u64,
}

impl BlendEngine {
    /// Local blending only.
    pub fn new(store: PatternStore, config: BlendConfig) -> Self {
        let assisted = config.model_assisted;
        Self {
            store,
            config,
            position: BlendPosition::default(),
            state: ModelState::Unloaded,
            assisted,
            worker: None,
            latents: None,
            encode_pending: None,
            seq: 0,
        }
    }

    /// Starts the model worker and asks it to load. Blending stays local until
    /// the model is ready and the corners are encoded.
    pub fn with_model(store: PatternStore, config: BlendConfig, model: Arc<dyn DrumModel>) -> Result<Self, anyhow::Error> {
        let debounce = Duration::from_millis(config.debounce_ms);
        let mut engine = Self::new(store, config);
        let adapter = Arc::new(InterpolationAdapter::new(model));
        let worker = ModelWorker::spawn(adapter, debounce)?;
        if worker.submit(ModelJob::Load) {
            engine.state = engine.state.begin_loading();
            info!("model loading");
        }
        engine.worker = Some(worker);
        Ok(engine)
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn blended(&self) -> Pattern {
        *self.store.blended()
    }

    pub fn shared_blended(&self) -> Arc<ArcSwap<Pattern>> {
        self.store.shared_blended()
    }

    pub fn model_state(&self) -> ModelState {
        self.state
    }

    pub fn is_model_assisted(&self) -> bool {
        self.assisted
    }

    /// True when positions are currently sent to the model.
    pub fn uses_model(&self) -> bool {
        self.usable_latents().is_some()
    }

    pub fn position(&self) -> BlendPosition {
        self.position
    }

    pub fn weights(&self) -> CornerWeights {
        self.position.weights()
    }

    pub fn set_position(&mut self, position: BlendPosition) {
        self.position = position;
        self.seq += 1;
        let weights = position.weights();

        let Some(latents) = self.usable_latents() else {
            self.apply_local();
            return;
        };
        let latent = LatentVector::combine(latents, &weights);
        let job = ModelJob::Decode { seq: self.seq, latent, stochasticity: self.config.stochasticity };
        let sent = self.worker.as_ref().is_some_and(|w| w.submit(job));
        if !sent {
            self.disable(&ModelError::Unavailable("model worker stopped".to_string()));
        }
    }

    /// Replaces a corner, re-blends locally right away and re-encodes when the model is in use.
    pub fn set_corner(&mut self, corner: Corner, pattern: Pattern) {
        let generation = self.store.set_corner(corner, pattern);
        debug!(%corner, generation, "corner replaced");
        self.latents = None;
        self.seq += 1;
        self.apply_local();
        if self.assisted && self.state == ModelState::Ready {
            self.request_encode();
        }
    }

    pub fn set_model_assisted(&mut self, on: bool) {
        if on && self.state == ModelState::Disabled {
            warn!("model is disabled for this session, staying on local blending");
        }
        self.assisted = on;
        if on {
            if self.state == ModelState::Ready && self.latents.is_none() && self.encode_pending.is_none() {
                self.request_encode();
            }
        } else {
            self.seq += 1;
            self.apply_local();
        }
    }

    pub fn toggle_step(&mut self, track: DrumTrack, step: usize) {
        // a manual edit outranks any decode still in flight
        self.seq += 1;
        self.store.toggle_step(track, step);
    }

    /// Applies every finished worker result without blocking. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.worker.as_ref().and_then(|w| w.try_event()) {
            self.apply_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for one worker result.
    pub fn pump(&mut self, timeout: Duration) -> bool {
        match self.worker.as_ref().and_then(|w| w.recv_event_timeout(timeout)) {
            Some(event) => {
                self.apply_event(event);
                true
            }
            None => false,
        }
    }

    pub(crate) fn latest_seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn apply_event(&mut self, event: ModelEvent) {
        match event {
            ModelEvent::Loaded(Ok(())) => {
                self.state = self.state.load_finished(true);
                info!("model ready");
                if self.assisted && self.state == ModelState::Ready {
                    self.request_encode();
                }
            }
            ModelEvent::Loaded(Err(e)) => {
                self.state = self.state.load_finished(false);
                self.disable(&e);
            }
            ModelEvent::Encoded { generation, result } => {
                if self.state == ModelState::Disabled {
                    return;
                }
                if self.encode_pending == Some(generation) {
                    self.encode_pending = None;
                }
                match result {
                    Ok(latents) if generation == self.store.corner_generation() => {
                        debug!(generation, dim = latents.dim(), "corner latents cached");
                        self.latents = Some((generation, latents));
                    }
                    Ok(_) => debug!(generation, "dropping latents for replaced corners"),
                    Err(e) => self.disable(&e),
                }
            }
            ModelEvent::Decoded { seq, result } => {
                if self.state == ModelState::Disabled {
                    return;
                }
                match result {
                    Ok(pattern) if seq == self.seq => self.store.set_blended(pattern),
                    Ok(_) => debug!(seq, latest = self.seq, "dropping stale decode"),
                    Err(e) => self.disable(&e),
                }
            }
        }
    }

    fn usable_latents(&self) -> Option<&CornerLatents> {
        if !self.assisted || self.state != ModelState::Ready {
            return None;
        }
        match &self.latents {
            Some((generation, latents)) if *generation == self.store.corner_generation() => Some(latents),
            _ => None,
        }
    }

    fn request_encode(&mut self) {
        let generation = self.store.corner_generation();
        let job = ModelJob::Encode { generation, corners: *self.store.corners() };
        if self.worker.as_ref().is_some_and(|w| w.submit(job)) {
            self.encode_pending = Some(generation);
        } else {
            self.disable(&ModelError::Unavailable("model worker stopped".to_string()));
        }
    }

    fn apply_local(&mut self) {
        let pattern = local_blend(self.store.corners(), &self.position.weights(), self.config.threshold);
        self.store.set_blended(pattern);
    }

    fn disable(&mut self, reason: &ModelError) {
        warn!(error = %reason, "model-assisted blending disabled, using local blend");
        self.state = self.state.fail();
        self.latents = None;
        self.encode_pending = None;
        self.seq += 1;
        // Dropping the worker joins its thread, so no further model calls happen.
        self.worker = None;
        self.apply_local();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::GridModel;
    use beatblend_shared::presets;

    fn config() -> BlendConfig {
        BlendConfig { stochasticity: 0.0, debounce_ms: 20, ..BlendConfig::default() }
    }

    #[test]
    fn state_transitions() {
        assert_eq!(ModelState::Unloaded.begin_loading(), ModelState::Loading);
        assert_eq!(ModelState::Loading.load_finished(true), ModelState::Ready);
        assert_eq!(ModelState::Loading.load_finished(false), ModelState::Disabled);
        assert_eq!(ModelState::Ready.fail(), ModelState::Disabled);
        assert_eq!(ModelState::Disabled.begin_loading(), ModelState::Disabled);
        assert_eq!(ModelState::Disabled.load_finished(true), ModelState::Disabled);
    }

    #[test]
    fn local_engine_applies_position_immediately() {
        let mut engine = BlendEngine::new(PatternStore::default(), config());
        for corner in Corner::ALL {
            engine.set_position(BlendPosition::corner(corner));
            assert_eq!(&engine.blended(), presets::default_corners().get(corner));
        }
        assert_eq!(engine.model_state(), ModelState::Unloaded);
    }

    #[test]
    fn corner_change_reblends_at_current_position() {
        let mut engine = BlendEngine::new(PatternStore::default(), config());
        engine.set_position(BlendPosition::corner(Corner::C));
        engine.set_corner(Corner::C, presets::BREAKBEAT);
        assert_eq!(engine.blended(), presets::BREAKBEAT);
    }

    #[test]
    fn late_result_for_an_older_position_is_dropped() {
        let model = Arc::new(GridModel::default());
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(), model).unwrap();
        for _ in 0..200 {
            if engine.uses_model() {
                break;
            }
            engine.pump(Duration::from_millis(10));
        }
        assert!(engine.uses_model());

        engine.set_position(BlendPosition::new(0.1, 0.1));
        let p1 = engine.latest_seq();
        engine.set_position(BlendPosition::new(0.9, 0.9));
        let p3 = engine.latest_seq();

        engine.apply_event(ModelEvent::Decoded { seq: p3, result: Ok(presets::MINIMAL) });
        assert_eq!(engine.blended(), presets::MINIMAL);
        engine.apply_event(ModelEvent::Decoded { seq: p1, result: Ok(presets::FUNK) });
        assert_eq!(engine.blended(), presets::MINIMAL);
    }

    #[test]
    fn disabled_model_cannot_be_revived_by_toggle() {
        let model = Arc::new(GridModel::default());
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(), model).unwrap();
        engine.apply_event(ModelEvent::Loaded(Err(ModelError::Unavailable("offline".into()))));
        assert_eq!(engine.model_state(), ModelState::Disabled);
        engine.set_model_assisted(false);
        engine.set_model_assisted(true);
        assert_eq!(engine.model_state(), ModelState::Disabled);
        assert!(!engine.uses_model());
        engine.set_position(BlendPosition::corner(Corner::D));
        assert_eq!(engine.blended(), presets::FUNK);
    }

    #[test]
    fn manual_toggle_wins_over_in_flight_decode() {
        let mut engine = BlendEngine::new(PatternStore::default(), config());
        engine.set_position(BlendPosition::corner(Corner::A));
        let before = engine.latest_seq();
        engine.toggle_step(DrumTrack::Hat, 1);
        assert!(engine.blended().is_active(DrumTrack::Hat, 1));
        engine.state = ModelState::Ready;
        engine.apply_event(ModelEvent::Decoded { seq: before, result: Ok(Pattern::empty()) });
        assert!(engine.blended().is_active(DrumTrack::Hat, 1));
    }
}
