//! Host metric probes for the minder agent.
//!
//! Each [`Probe`] implementation reads one scalar gauge (CPU usage,
//! memory usage) from the local host. Probes are polled by the agent's
//! sampling loop and on demand by the status command.

pub mod cpu;
pub mod memory;

use anyhow::Result;

/// A single-value metric probe running on the monitored host.
///
/// Implementations are registered in the agent's sampling loop and read
/// at each sampling interval. The trait requires `Send + Sync` so probes
/// can be shared with command handlers that sample on demand.
pub trait Probe: Send + Sync {
    /// Returns the probe name (e.g., `"cpu"`, `"memory"`), used for
    /// logging.
    fn name(&self) -> &str;

    /// Reads the current value as a percentage in `0.0..=100.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails.
    fn sample(&mut self) -> Result<f64>;
}
