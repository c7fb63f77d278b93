use chronosrs::{
    cli::{validate_knob, validate_ppqn, Args},
    clock_source::{ClockSource, ExternalClockSource},
    create_scheduler, create_shared_transport, logging,
    runtime::{run_fast_phase, run_slow_phase},
    ui::run_state_inspector,
    ModuleSettings, PanelInputs, PanelOutputs, Scheduler, SharedTransport,
};
use clap::Parser;
use crossbeam::channel::{unbounded, Receiver};
use std::sync::Arc;
use std::{thread, time::Duration};

fn main() {
    let args = Args::parse();
    initialize_logging(args.verbose);

    let settings = load_settings(&args).unwrap_or_else(|error_msg| fail(&error_msg));
    for (name, value) in [("BPM knob", args.bpm_knob), ("Swing knob", args.swing)] {
        if let Err(error_msg) = validate_knob(name, value) {
            fail(&error_msg);
        }
    }

    let transport = create_shared_transport(&settings);
    let inputs = Arc::new(PanelInputs::new());
    let outputs = Arc::new(PanelOutputs::new());
    configure_panel(&args, &inputs);

    let (shutdown_tx, shutdown_rx) = unbounded::<()>();

    let clock_handle = match args.external_bpm {
        Some(bpm) => {
            log::info!("Following external clock at {} BPM", bpm);
            let source = ExternalClockSource::new(bpm, settings.ppqn, Arc::clone(&inputs));
            Some(source.start(shutdown_rx.clone()))
        }
        None => {
            log::info!("Free-running from BPM knob {}", args.bpm_knob);
            inputs.play.raise();
            None
        }
    };

    let scheduler = create_scheduler();
    let mut handles = start_phases(
        &scheduler,
        &settings,
        &transport,
        &inputs,
        &outputs,
        &shutdown_rx,
    );
    handles.push(run_state_inspector(transport.clone(), shutdown_rx));
    handles.extend(clock_handle);

    log::info!("Running for {} seconds", args.duration_secs);
    thread::sleep(Duration::from_secs(args.duration_secs));

    drop(shutdown_tx);
    for handle in handles {
        if handle.join().is_err() {
            log::error!("A worker thread panicked during shutdown");
        }
    }
    log::info!("Application stopped");
}

fn initialize_logging(verbose: bool) {
    let result = if verbose {
        logging::init_stderr_logger()
    } else {
        logging::init_logger()
    };
    if let Err(e) = result {
        eprintln!("{}", e);
    }
    log::info!("Application starting");
}

fn load_settings(args: &Args) -> Result<ModuleSettings, String> {
    let mut settings = ModuleSettings::load(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(ppqn) = args.ppqn {
        settings.ppqn = validate_ppqn(ppqn)?;
    }
    Ok(settings)
}

fn configure_panel(args: &Args, inputs: &PanelInputs) {
    inputs.set_bpm_knob(args.bpm_knob);
    inputs.set_swing_knob(args.swing);
    inputs.set_scrub_cv(args.scrub);
    inputs.set_time_mult_switch(args.time_mult);
    inputs.set_time_mult_cv(args.time_mult_cv);
    inputs.set_swing_cv(args.swing_cv);
    inputs.set_user_division_cv(args.ud_cv);
    // Feed the selector as the matching detent reading
    inputs.set_user_division_knob(u16::from(args.user_division.min(7)) * (4095 / 7));
}

fn start_phases<T: Scheduler>(
    scheduler: &T,
    settings: &ModuleSettings,
    transport: &SharedTransport,
    inputs: &Arc<PanelInputs>,
    outputs: &Arc<PanelOutputs>,
    shutdown: &Receiver<()>,
) -> Vec<thread::JoinHandle<()>> {
    let fast_period = Duration::from_micros(u64::from(settings.fast_period_micros));
    let slow_period = Duration::from_micros(u64::from(settings.slow_period_micros));

    let fast = {
        let (transport, inputs, outputs, shutdown) = (
            transport.clone(),
            Arc::clone(inputs),
            Arc::clone(outputs),
            shutdown.clone(),
        );
        scheduler.spawn(move || run_fast_phase(transport, inputs, outputs, fast_period, shutdown))
    };

    let slow = {
        let (transport, inputs, outputs, shutdown) = (
            transport.clone(),
            Arc::clone(inputs),
            Arc::clone(outputs),
            shutdown.clone(),
        );
        scheduler.spawn(move || run_slow_phase(transport, inputs, outputs, slow_period, shutdown))
    };

    vec![fast, slow]
}

fn fail(error_msg: &str) -> ! {
    log::error!("{}", error_msg);
    eprintln!("{}", error_msg);
    std::process::exit(1);
}
