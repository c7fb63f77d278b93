//! Fast and slow phase loops for running the transport on a desktop.
//!
//! The transport sits behind a mutex. A fast-phase iteration and a slow-phase iteration can
//! never interleave, so neither ever sees the other's half-finished update. Panel inputs and
//! outputs are atomics outside the lock, so clock sources and displays never contend for it.

use crate::config::ModuleSettings;
use crate::panel::{PanelInputs, PanelOutputs};
use crate::transport::{Transport, TransportMode};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type SharedTransport = Arc<Mutex<Transport>>;

pub fn create_shared_transport(settings: &ModuleSettings) -> SharedTransport {
    Arc::new(Mutex::new(Transport::new(settings)))
}

/// One fast-phase iteration: feed the panel into the transport and publish the gates.
/// Returns false when the transport lock is poisoned and nothing was updated.
pub fn fast_step(
    transport: &SharedTransport,
    inputs: &PanelInputs,
    outputs: &PanelOutputs,
    elapsed_micros: u32,
) -> bool {
    let fast_inputs = inputs.fast_inputs(elapsed_micros);
    match transport.lock() {
        Ok(mut transport) => {
            let gates = transport.fast_tick(inputs, &fast_inputs);
            outputs.write_gates(&gates);
            true
        }
        Err(_) => false,
    }
}

/// One slow-phase iteration. Returns the mode after the update.
pub fn slow_step(
    transport: &SharedTransport,
    inputs: &PanelInputs,
    outputs: &PanelOutputs,
) -> Option<TransportMode> {
    let slow_inputs = inputs.slow_inputs();
    let mut transport = transport.lock().ok()?;
    let request = transport.slow_tick(&slow_inputs);
    outputs.write_indicators(&request);
    Some(transport.mode())
}

fn elapsed_micros(since: Instant) -> u32 {
    u32::try_from(since.elapsed().as_micros()).unwrap_or(u32::MAX)
}

/// Waits out the rest of a period. Returns false once shutdown is signalled.
fn wait_period(shutdown: &Receiver<()>, started: Instant, period: Duration) -> bool {
    let remaining = period.saturating_sub(started.elapsed());
    matches!(
        shutdown.recv_timeout(remaining),
        Err(RecvTimeoutError::Timeout)
    )
}

/// Runs the fast phase until the shutdown sender is dropped or sends
pub fn run_fast_phase(
    transport: SharedTransport,
    inputs: Arc<PanelInputs>,
    outputs: Arc<PanelOutputs>,
    period: Duration,
    shutdown: Receiver<()>,
) {
    info!("Fast phase started with period {:?}", period);
    let mut last = Instant::now();
    let mut overruns: u64 = 0;
    let mut poisoned = false;

    loop {
        let started = Instant::now();
        let elapsed = elapsed_micros(last);
        last = started;

        if !fast_step(&transport, &inputs, &outputs, elapsed) && !poisoned {
            warn!("Transport lock poisoned; gates are no longer updated");
            poisoned = true;
        }

        if started.elapsed() > period {
            overruns += 1;
        }
        if !wait_period(&shutdown, started, period) {
            break;
        }
    }

    if overruns > 0 {
        warn!("Fast phase overran its period {} times", overruns);
    }
    info!("Fast phase stopped");
}

/// Runs the slow phase until the shutdown sender is dropped or sends
pub fn run_slow_phase(
    transport: SharedTransport,
    inputs: Arc<PanelInputs>,
    outputs: Arc<PanelOutputs>,
    period: Duration,
    shutdown: Receiver<()>,
) {
    info!("Slow phase started with period {:?}", period);
    let mut last_mode = None;

    loop {
        let started = Instant::now();

        let mode = slow_step(&transport, &inputs, &outputs);
        if mode != last_mode {
            match mode {
                Some(mode) => info!("Transport mode: {:?}", mode),
                None => warn!("Transport lock poisoned"),
            }
            last_mode = mode;
        }

        if !wait_period(&shutdown, started, period) {
            break;
        }
    }

    debug!("Slow phase last mode: {:?}", last_mode);
    info!("Slow phase stopped");
}
