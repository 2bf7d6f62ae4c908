#[cfg(test)]
mod tests {
    use crate::adapter::{DrumModel, GridModel, NoteSequence};
    use crate::{BlendEngine, ModelState, PatternStore};
    use beatblend_shared::{local_blend, presets, BlendConfig, BlendPosition, Corner, ModelError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// Wraps the grid model and records every physical decode.
    struct CountingModel {
        inner: GridModel,
        decodes: AtomicUsize,
        last_latent: Mutex<Vec<f32>>,
    }

    impl CountingModel {
        fn new() -> Self {
            Self { inner: GridModel::default(), decodes: AtomicUsize::new(0), last_latent: Mutex::new(Vec::new()) }
        }
    }

    impl DrumModel for CountingModel {
        fn initialize(&self) -> Result<(), ModelError> {
            self.inner.initialize()
        }

        fn encode(&self, sequences: &[NoteSequence]) -> Result<Vec<Vec<f32>>, ModelError> {
            self.inner.encode(sequences)
        }

        fn decode(&self, latent: &[f32], temperature: f32) -> Result<NoteSequence, ModelError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            *self.last_latent.lock().unwrap() = latent.to_vec();
            self.inner.decode(latent, temperature)
        }
    }

    /// Encodes fine, never decodes.
    struct BrokenDecoder {
        inner: GridModel,
        decodes: AtomicUsize,
    }

    impl DrumModel for BrokenDecoder {
        fn initialize(&self) -> Result<(), ModelError> {
            Ok(())
        }

        fn encode(&self, sequences: &[NoteSequence]) -> Result<Vec<Vec<f32>>, ModelError> {
            self.inner.encode(sequences)
        }

        fn decode(&self, _latent: &[f32], _temperature: f32) -> Result<NoteSequence, ModelError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            Err(ModelError::Inference("checkpoint missing".to_string()))
        }
    }

    struct NoModel;

    impl DrumModel for NoModel {
        fn initialize(&self) -> Result<(), ModelError> {
            Err(ModelError::Unavailable("weights not found".to_string()))
        }

        fn encode(&self, _sequences: &[NoteSequence]) -> Result<Vec<Vec<f32>>, ModelError> {
            unreachable!("encode after failed load")
        }

        fn decode(&self, _latent: &[f32], _temperature: f32) -> Result<NoteSequence, ModelError> {
            unreachable!("decode after failed load")
        }
    }

    fn config(debounce_ms: u64) -> BlendConfig {
        BlendConfig { stochasticity: 0.0, debounce_ms, ..BlendConfig::default() }
    }

    fn pump_until(engine: &mut BlendEngine, timeout: Duration, mut done: impl FnMut(&BlendEngine) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done(engine) {
                return true;
            }
            engine.pump(Duration::from_millis(10));
        }
        done(engine)
    }

    fn local(pos: BlendPosition) -> beatblend_shared::Pattern {
        local_blend(&presets::default_corners(), &pos.weights(), 0.5)
    }

    #[test]
    fn burst_of_positions_decodes_once_with_the_last() {
        let model = Arc::new(CountingModel::new());
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(120), model.clone()).unwrap();
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.uses_model()));

        let p1 = BlendPosition::new(0.1, 0.9);
        let p2 = BlendPosition::new(0.5, 0.5);
        let p3 = BlendPosition::new(0.9, 0.1);
        let before = engine.blended();
        engine.set_position(p1);
        engine.set_position(p2);
        engine.set_position(p3);
        // nothing applied synchronously while the model is in charge
        assert_eq!(engine.blended(), before);

        assert!(pump_until(&mut engine, Duration::from_secs(2), |_| model.decodes.load(Ordering::SeqCst) > 0));
        engine.pump(Duration::from_millis(200));
        engine.poll();

        assert_eq!(model.decodes.load(Ordering::SeqCst), 1);
        let expected: Vec<f32> = {
            let mut v = Vec::new();
            let g = GridModel::default();
            let corners = presets::default_corners();
            let seqs: Vec<NoteSequence> = corners.as_array().iter().map(NoteSequence::from_pattern).collect();
            let batch = g.encode(&seqs).unwrap();
            let w = p3.weights();
            for i in 0..batch[0].len() {
                v.push(Corner::ALL.iter().map(|c| w.get(*c) as f32 * batch[c.index()][i]).sum());
            }
            v
        };
        let got = model.last_latent.lock().unwrap().clone();
        assert_eq!(got.len(), expected.len());
        for (a, b) in got.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        assert_eq!(engine.blended(), local(p3));
    }

    #[test]
    fn failing_decoder_falls_back_to_local_for_good() {
        let model = Arc::new(BrokenDecoder { inner: GridModel::default(), decodes: AtomicUsize::new(0) });
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(10), model.clone()).unwrap();
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.uses_model()));

        let p1 = BlendPosition::new(0.3, 0.7);
        engine.set_position(p1);
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.model_state() == ModelState::Disabled));
        assert_eq!(engine.blended(), local(p1));

        for pos in [BlendPosition::new(1.0, 0.0), BlendPosition::new(0.0, 1.0), BlendPosition::new(0.6, 0.6)] {
            engine.set_position(pos);
            assert_eq!(engine.blended(), local(pos));
        }
        assert_eq!(model.decodes.load(Ordering::SeqCst), 1);
        assert!(!engine.uses_model());
    }

    #[test]
    fn failed_load_keeps_blending_local() {
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(10), Arc::new(NoModel)).unwrap();
        let pos = BlendPosition::new(0.25, 0.75);
        engine.set_position(pos);
        // local result is there before the load even finishes
        assert_eq!(engine.blended(), local(pos));
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.model_state() == ModelState::Disabled));
        assert_eq!(engine.blended(), local(pos));
    }

    #[test]
    fn corner_change_reencodes_and_stays_local_meanwhile() {
        let model = Arc::new(CountingModel::new());
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(10), model.clone()).unwrap();
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.uses_model()));

        engine.set_position(BlendPosition::corner(Corner::B));
        engine.set_corner(Corner::B, presets::BACKBEAT);
        assert!(!engine.uses_model());
        assert_eq!(engine.blended(), presets::BACKBEAT);

        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.uses_model()));
        let decoded_before = model.decodes.load(Ordering::SeqCst);
        engine.set_position(BlendPosition::corner(Corner::C));
        assert!(pump_until(&mut engine, Duration::from_secs(2), |_| model.decodes.load(Ordering::SeqCst) > decoded_before));
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.blended() == presets::MINIMAL));
    }

    #[test]
    fn switching_assist_off_blends_locally() {
        let model = Arc::new(CountingModel::new());
        let mut engine = BlendEngine::with_model(PatternStore::default(), config(10), model.clone()).unwrap();
        assert!(pump_until(&mut engine, Duration::from_secs(2), |e| e.uses_model()));
        engine.set_model_assisted(false);
        let pos = BlendPosition::new(0.7, 0.2);
        engine.set_position(pos);
        assert_eq!(engine.blended(), local(pos));
        engine.pump(Duration::from_millis(100));
        assert_eq!(model.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(engine.model_state(), ModelState::Ready);
    }
}
