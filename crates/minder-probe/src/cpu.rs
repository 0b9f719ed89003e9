use crate::Probe;
use anyhow::Result;
use sysinfo::System;

pub struct CpuProbe {
    system: System,
}

impl CpuProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // Usage is a delta between refreshes; prime the first point here
        // so the first sample already has a baseline.
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Probe for CpuProbe {
    fn name(&self) -> &str {
        "cpu"
    }

    fn sample(&mut self) -> Result<f64> {
        self.system.refresh_cpu_all();
        Ok(self.system.global_cpu_usage() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_usage_is_a_percentage() {
        let mut probe = CpuProbe::new();
        let value = probe.sample().unwrap();
        assert!((0.0..=100.0).contains(&value), "got {value}");
    }
}
