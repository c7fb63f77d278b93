pub mod cli;
pub mod clock_source;
pub mod config;
pub mod error;
pub mod gate;
pub mod interval;
pub mod logging;
pub mod panel;
pub mod runtime;
pub mod scheduler;
pub mod swing;
pub mod tempo;
pub mod transport;
pub mod ui;

pub use cli::Args;
pub use config::{ModuleSettings, Ppqn, TimeMultiplier};
pub use error::{ChronosError, Result};
pub use panel::{PanelInputs, PanelOutputs};
pub use runtime::{create_shared_transport, SharedTransport};
pub use scheduler::{Scheduler, ThreadScheduler};
pub use transport::{
    FastInputs, IndicatorRequest, LedState, PulseEdges, SlowInputs, Transport, TransportMode,
    TransportSnapshot,
};

pub fn create_scheduler() -> ThreadScheduler {
    ThreadScheduler::new()
}
