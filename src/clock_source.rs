// clock_source.rs

use crate::config::Ppqn;
use crate::panel::PanelInputs;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{info, trace};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub trait ClockSource {
    fn start(&self, shutdown: Receiver<()>) -> JoinHandle<()>;
}

/// Pulse period for a tempo at a clock resolution
pub fn pulse_interval(bpm: f64, ppqn: Ppqn) -> Duration {
    let pulses_per_second = bpm / 60.0 * f64::from(ppqn.pulses());
    Duration::from_secs_f64(1.0 / pulses_per_second)
}

/// Drives the panel clock input like an external master clock would
pub struct ExternalClockSource {
    bpm: f64,
    ppqn: Ppqn,
    panel: Arc<PanelInputs>,
}

impl ExternalClockSource {
    pub fn new(bpm: f64, ppqn: Ppqn, panel: Arc<PanelInputs>) -> Self {
        info!(
            "Creating external clock source at {} BPM, {} PPQN",
            bpm,
            ppqn.pulses()
        );
        ExternalClockSource { bpm, ppqn, panel }
    }
}

impl ClockSource for ExternalClockSource {
    fn start(&self, shutdown: Receiver<()>) -> JoinHandle<()> {
        let interval = pulse_interval(self.bpm, self.ppqn);
        trace!("Calculated pulse interval: {:?}", interval);
        let panel = Arc::clone(&self.panel);

        thread::spawn(move || {
            info!("External clock thread started");
            let start_time = Instant::now();
            let mut next_pulse = start_time;
            let mut pulse_count: u64 = 0;

            loop {
                panel.clock.raise();
                pulse_count += 1;
                trace!(
                    "Clock pulse {} at {} ms",
                    pulse_count,
                    start_time.elapsed().as_millis()
                );

                // Schedule against the start time so sleep jitter does not accumulate
                next_pulse += interval;
                let wait = next_pulse.saturating_duration_since(Instant::now());
                match shutdown.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            info!("External clock stopped after {} pulses", pulse_count);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;

    #[test]
    fn test_pulse_interval() {
        let interval = pulse_interval(120.0, Ppqn::Ppqn24);
        assert_eq!(interval.as_micros(), 20_833);
        assert_eq!(pulse_interval(60.0, Ppqn::Ppqn1), Duration::from_secs(1));
    }

    #[test]
    fn test_source_raises_clock_until_shutdown() {
        let panel = Arc::new(PanelInputs::new());
        let source = ExternalClockSource::new(600.0, Ppqn::Ppqn4, Arc::clone(&panel));
        let (tx, rx) = bounded(1);

        let handle = source.start(rx);
        thread::sleep(Duration::from_millis(50));
        assert!(panel.clock.take());

        tx.send(()).unwrap();
        handle.join().unwrap();
    }
}
