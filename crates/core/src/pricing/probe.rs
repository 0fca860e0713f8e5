//! Host load probes.

use std::fs;
use std::sync::Mutex;

use tracing::warn;

use super::types::HostLoad;

/// Source of host load readings for the surge sampler.
pub trait LoadProbe: Send + Sync {
    fn sample(&self) -> HostLoad;
}

#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// Probe backed by `/proc/stat` and `/proc/meminfo`.
///
/// CPU utilisation is computed from the delta between consecutive samples,
/// so the first reading reports 0. Hosts where `/proc` is unreadable report
/// zeros instead of failing; surge pricing then degrades to the active-user
/// signal alone.
pub struct ProcLoadProbe {
    prev_cpu: Mutex<Option<CpuTimes>>,
}

impl ProcLoadProbe {
    pub fn new() -> Self {
        Self {
            prev_cpu: Mutex::new(None),
        }
    }

    fn read_cpu_times() -> Option<CpuTimes> {
        let stat = fs::read_to_string("/proc/stat").ok()?;
        let line = stat.lines().next()?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|v| v.parse().ok())
            .collect();
        if fields.len() < 5 {
            return None;
        }

        let total: u64 = fields.iter().sum();
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(CpuTimes {
            busy: total - idle,
            total,
        })
    }

    fn read_memory_pct() -> Option<f32> {
        let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
        let mut total_kb = None;
        let mut available_kb = None;

        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kb = rest.split_whitespace().next()?.parse::<u64>().ok();
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kb = rest.split_whitespace().next()?.parse::<u64>().ok();
            }
        }

        let total = total_kb?;
        let available = available_kb?;
        if total == 0 {
            return None;
        }
        Some((1.0 - available as f32 / total as f32) * 100.0)
    }
}

impl Default for ProcLoadProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProbe for ProcLoadProbe {
    fn sample(&self) -> HostLoad {
        let cpu_pct = match Self::read_cpu_times() {
            Some(current) => {
                let mut prev = self.prev_cpu.lock().unwrap();
                let pct = match *prev {
                    Some(p) if current.total > p.total => {
                        let busy = (current.busy - p.busy) as f32;
                        let total = (current.total - p.total) as f32;
                        busy / total * 100.0
                    }
                    _ => 0.0,
                };
                *prev = Some(current);
                pct
            }
            None => {
                warn!("failed to read /proc/stat, reporting 0% cpu");
                0.0
            }
        };

        let memory_pct = Self::read_memory_pct().unwrap_or_else(|| {
            warn!("failed to read /proc/meminfo, reporting 0% memory");
            0.0
        });

        HostLoad {
            cpu_pct,
            memory_pct,
        }
    }
}
