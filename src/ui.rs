// ui.rs

use crate::config::BEAT_TIME_QUARTER;
use crate::gate::NUM_GATES;
use crate::runtime::SharedTransport;
use crate::transport::TransportSnapshot;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::thread;
use std::time::Duration;

const QUARTERS_PER_BAR: u64 = 4;
const GATE_LABELS: [&str; NUM_GATES] = ["1", "1/2", "1/4", "1/16", "UD", "UD/2"];

pub fn create_bar_progress(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(
        u64::from(BEAT_TIME_QUARTER) * QUARTERS_PER_BAR,
    ));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("⣀⣤⣦⣶⣷⣿ "),
    );
    pb.set_prefix("Bar");
    pb
}

pub fn create_transport_spinner(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("Transport");
    pb
}

/// Renders the six gates as `1:# 1/2:. ...`
pub fn format_gates(gates: &[bool; NUM_GATES]) -> String {
    GATE_LABELS
        .iter()
        .zip(gates.iter())
        .map(|(label, &high)| format!("{}:{}", label, if high { '#' } else { '.' }))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_snapshot(snapshot: &TransportSnapshot) -> String {
    format!(
        "{:?} | target {:.2} BPM | estimate {:.2} BPM | {} us/grad | {}",
        snapshot.mode,
        snapshot.target_bpm,
        snapshot.estimated_bpm,
        snapshot.interval_micros,
        format_gates(&snapshot.gates)
    )
}

/// Shows the transport on stderr until shutdown
pub fn run_state_inspector(
    transport: SharedTransport,
    shutdown: Receiver<()>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let bar_pb = create_bar_progress(&multi_progress);
        let transport_pb = create_transport_spinner(&multi_progress);
        let bar_length = u64::from(BEAT_TIME_QUARTER) * QUARTERS_PER_BAR;

        loop {
            let snapshot = match transport.lock() {
                Ok(transport) => transport.snapshot(),
                Err(_) => break,
            };

            bar_pb.set_position(u64::from(snapshot.warped_beat_time) % bar_length);
            transport_pb.set_message(format_snapshot(&snapshot));
            transport_pb.tick();

            match shutdown.recv_timeout(Duration::from_millis(100)) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }

        bar_pb.finish_and_clear();
        transport_pb.finish_and_clear();
    })
}
