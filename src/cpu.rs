use std::path::PathBuf;

// Aggregate jiffy counters from the first `cpu` line of /proc/stat
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<u64>>>()?;

    // user nice system idle iowait irq softirq steal ...
    if values.len() < 4 {
        return None;
    }

    // guest and guest_nice are already counted in user and nice
    let counted = values.len().min(8);
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total = values[..counted].iter().sum();

    Some(CpuTimes { idle, total })
}

/// Non-blocking CPU utilization network.
///
/// Each call reports the busy percentage since the previous call. The first
/// call has nothing to compare against and reports 0, so callers prime it once.
pub struct CpuSampler {
    stat_path: PathBuf,
    prev: Option<CpuTimes>,
}

impl CpuSampler {
    pub fn new(stat_path: impl Into<PathBuf>) -> Self {
        CpuSampler {
            stat_path: stat_path.into(),
            prev: None,
        }
    }

    /// Busy percentage in [0, 100]. Unreadable counters read as 0.
    pub fn sample(&mut self) -> f64 {
        let current = match std::fs::read_to_string(&self.stat_path)
            .ok()
            .and_then(|s| parse_cpu_times(&s))
        {
            Some(t) => t,
            None => {
                log::debug!("cpu counters unavailable at {}", self.stat_path.display());
                return 0.0;
            }
        };

        let percent = match self.prev {
            Some(prev) => {
                let total = current.total.saturating_sub(prev.total);
                let idle = current.idle.saturating_sub(prev.idle);
                if total > 0 {
                    (total.saturating_sub(idle) as f64 / total as f64) * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.prev = Some(current);
        percent.clamp(0.0, 100.0)
    }
}
