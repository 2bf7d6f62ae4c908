#[cfg(test)]
mod tests {
    use crate::export::decode_wav;
    use crate::renderer::RenderPath;
    use crate::{AudioBuffer, HybridRenderer, LiveEngine, OfflineRenderer, Provenance, RenderRequest};
    use beatblend_shared::{presets, AudioConfig, DrumTrack, EngineConfig, Pattern, RenderError};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct FailingOffline;

    impl RenderPath for FailingOffline {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn render(&mut self, _request: &RenderRequest) -> Result<AudioBuffer, RenderError> {
            Err(RenderError::Offline("synth unavailable".to_string()))
        }
    }

    fn kick_on_one() -> Pattern {
        Pattern::from_rows(b"x...............", b"................", b"................")
    }

    fn headless(config: &EngineConfig) -> LiveEngine {
        LiveEngine::headless(&config.audio, Duration::from_millis(config.render.start_delay_ms)).unwrap()
    }

    #[test]
    fn kick_onset_lands_on_frame_zero_and_decays() {
        let audio = AudioConfig::default();
        let buffer = OfflineRenderer::from_config(&audio).render_pattern(&kick_on_one(), 120.0, 1).unwrap();
        assert_eq!(buffer.frames(), 88_200);

        let onset = (0..buffer.frames()).find(|i| buffer.frame(*i)[0] != 0.0).unwrap();
        assert!(onset <= 1, "onset at frame {onset}");

        let decay_end = (0.2 * 44_100.0) as usize + 1;
        let head = AudioBuffer::new(buffer.samples()[..decay_end * 2].to_vec(), 2, 44_100);
        assert!(head.peak() > 0.2);
        let tail = &buffer.samples()[decay_end * 2..];
        assert!(tail.iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn audible_offline_render_is_used_directly() {
        let config = EngineConfig::default();
        let mut live = headless(&config);
        let mut renderer = HybridRenderer::new(&config);
        let request = RenderRequest::new(presets::FUNK, 96.0, 2).unwrap();
        let result = renderer.render(&request, &mut live).unwrap();
        assert_eq!(result.provenance, Provenance::Offline);
        assert_eq!(result.buffer.frames(), 220_500);

        let decoded = decode_wav(&result.wav).unwrap();
        assert_eq!(decoded.frames(), 220_500);
        assert_eq!(decoded.sample_rate(), 44_100);
        assert!(result.data_url().starts_with("data:audio/wav;base64,UklGR"));
    }

    #[test]
    fn failed_offline_path_falls_back_to_capture() {
        let mut config = EngineConfig::default();
        config.render.settle_ms = 100;
        let mut live = headless(&config);
        let mut renderer = HybridRenderer::new(&config).with_offline(Box::new(FailingOffline));
        let request = RenderRequest::new(presets::FOUR_ON_THE_FLOOR, 240.0, 1).unwrap();
        let result = renderer.render(&request, &mut live).unwrap();
        assert_eq!(result.provenance, Provenance::LiveCaptured);
        assert!(result.buffer.peak() > 0.01);
        assert!(!live.is_playing());
    }

    #[test]
    fn silent_everywhere_is_a_failure() {
        let mut config = EngineConfig::default();
        config.render.settle_ms = 50;
        let mut live = headless(&config);
        let mut renderer = HybridRenderer::new(&config);
        let request = RenderRequest::new(Pattern::empty(), 480.0, 1).unwrap();
        match renderer.render(&request, &mut live) {
            Err(RenderError::Failed { offline, capture }) => {
                assert!(offline.contains("silent"), "{offline}");
                assert!(capture.contains("silent"), "{capture}");
            }
            other => panic!("expected failure, got {:?}", other.map(|r| r.provenance)),
        }
    }

    #[test]
    fn render_stops_monitor_playback_first() {
        let config = EngineConfig::default();
        let mut live = headless(&config);
        let mut busy = Pattern::empty();
        for step in 0..16 {
            busy.set(DrumTrack::Hat, step, true);
        }
        let shared = Arc::new(arc_swap::ArcSwap::from_pointee(busy));
        live.play(shared, 140.0, None).unwrap();
        thread::sleep(Duration::from_millis(150));
        assert!(live.is_playing());
        let session = live.transport().generation();

        let mut renderer = HybridRenderer::new(&config);
        let request = RenderRequest::new(kick_on_one(), 120.0, 1).unwrap();
        let result = renderer.render(&request, &mut live).unwrap();
        assert_eq!(result.provenance, Provenance::Offline);
        assert!(!live.is_playing());
        assert!(!live.transport().is_current(session));
        // the offline result holds the requested kick only, no monitor hats
        let tail = &result.buffer.samples()[(0.25 * 44_100.0) as usize * 2..];
        assert!(tail.iter().all(|s| s.abs() < 1e-4));
    }
}
