use chronosrs::clock_source::{ClockSource, ExternalClockSource};
use chronosrs::panel::Indicator;
use chronosrs::runtime::{run_fast_phase, run_slow_phase};
use chronosrs::{
    create_scheduler, create_shared_transport, LedState, ModuleSettings, PanelInputs,
    PanelOutputs, Ppqn, Scheduler, SharedTransport, TransportMode,
};
use crossbeam::channel::{unbounded, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Harness {
    transport: SharedTransport,
    inputs: Arc<PanelInputs>,
    outputs: Arc<PanelOutputs>,
    shutdown: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Harness {
    fn start(settings: &ModuleSettings) -> Self {
        let transport = create_shared_transport(settings);
        let inputs = Arc::new(PanelInputs::new());
        let outputs = Arc::new(PanelOutputs::new());
        let (shutdown, shutdown_rx) = unbounded::<()>();
        let scheduler = create_scheduler();

        let fast = {
            let (transport, inputs, outputs, rx) = (
                transport.clone(),
                Arc::clone(&inputs),
                Arc::clone(&outputs),
                shutdown_rx.clone(),
            );
            scheduler.spawn(move || {
                run_fast_phase(transport, inputs, outputs, Duration::from_micros(40), rx)
            })
        };
        let slow = {
            let (transport, inputs, outputs, rx) = (
                transport.clone(),
                Arc::clone(&inputs),
                Arc::clone(&outputs),
                shutdown_rx,
            );
            scheduler.spawn(move || {
                run_slow_phase(transport, inputs, outputs, Duration::from_millis(1), rx)
            })
        };

        Harness {
            transport,
            inputs,
            outputs,
            shutdown,
            handles: vec![fast, slow],
        }
    }

    fn mode(&self) -> TransportMode {
        self.transport.lock().unwrap().mode()
    }

    fn stop(self) {
        drop(self.shutdown);
        for handle in self.handles {
            handle.join().unwrap();
        }
    }
}

#[test]
fn test_phases_stop_when_shutdown_sender_drops() {
    let harness = Harness::start(&ModuleSettings::default());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(harness.mode(), TransportMode::Stopped);
    assert_eq!(harness.outputs.led(Indicator::Play), LedState::FadeSlow);
    harness.stop();
}

#[test]
fn test_play_button_runs_internal_clock() {
    let harness = Harness::start(&ModuleSettings::default());
    harness.inputs.set_bpm_knob(4095);
    harness.inputs.set_time_mult_switch(2);
    harness.inputs.play.raise();

    thread::sleep(Duration::from_millis(200));
    let (mode, beat_time) = {
        let transport = harness.transport.lock().unwrap();
        (transport.mode(), transport.beat_time())
    };
    assert_eq!(mode, TransportMode::PlayingInternal);
    assert!(beat_time > 0);
    assert_eq!(harness.outputs.led(Indicator::Clock), LedState::SolidOff);
    harness.stop();
}

#[test]
fn test_follows_external_clock_and_drops_out() {
    let settings = ModuleSettings::default();
    assert_eq!(settings.ppqn, Ppqn::Ppqn24);
    let harness = Harness::start(&settings);

    let (clock_tx, clock_rx) = unbounded::<()>();
    let source = ExternalClockSource::new(120.0, settings.ppqn, Arc::clone(&harness.inputs));
    let clock = source.start(clock_rx);

    thread::sleep(Duration::from_millis(800));
    let estimate = {
        let transport = harness.transport.lock().unwrap();
        assert_eq!(transport.mode(), TransportMode::FollowingExternal);
        assert!(transport.beat_time() > 0);
        transport.tempo().estimated_bpm()
    };
    assert!((estimate - 120.0).abs() < 10.0, "estimate {}", estimate);
    assert_eq!(harness.outputs.led(Indicator::Clock), LedState::SolidOn);

    drop(clock_tx);
    clock.join().unwrap();

    // Keepalive at ~120 BPM is 32 gradations, about 125ms
    thread::sleep(Duration::from_millis(500));
    {
        let transport = harness.transport.lock().unwrap();
        assert_eq!(transport.mode(), TransportMode::Stopped);
        assert_eq!(transport.beat_time(), 0);
    }
    harness.stop();
}
