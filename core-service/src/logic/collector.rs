//! Collector - process resource samples
//!
//! The dispatcher takes one sample immediately before each classification.
//! Samples feed the cycle report only; nothing in the control path reads
//! them.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

/// CPU and memory utilisation at one instant, all values in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceSample {
    pub cpu_overall: f32,
    pub cpu_per_core: Vec<f32>,
    pub memory_percent: f32,
}

impl ResourceSample {
    /// Component-wise mean. Per-core values are averaged index by index over
    /// the samples that report that core. `None` for an empty input.
    pub fn mean<'a, I>(samples: I) -> Option<ResourceSample>
    where
        I: IntoIterator<Item = &'a ResourceSample>,
    {
        let mut count = 0u32;
        let mut cpu_sum = 0.0f64;
        let mut mem_sum = 0.0f64;
        let mut core_sums: Vec<(f64, u32)> = Vec::new();

        for sample in samples {
            count += 1;
            cpu_sum += sample.cpu_overall as f64;
            mem_sum += sample.memory_percent as f64;

            if core_sums.len() < sample.cpu_per_core.len() {
                core_sums.resize(sample.cpu_per_core.len(), (0.0, 0));
            }
            for (slot, usage) in core_sums.iter_mut().zip(&sample.cpu_per_core) {
                slot.0 += *usage as f64;
                slot.1 += 1;
            }
        }

        if count == 0 {
            return None;
        }

        let n = count as f64;
        Some(ResourceSample {
            cpu_overall: (cpu_sum / n) as f32,
            cpu_per_core: core_sums
                .into_iter()
                .map(|(sum, seen)| (sum / seen as f64) as f32)
                .collect(),
            memory_percent: (mem_sum / n) as f32,
        })
    }
}

/// Source of resource samples
pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> ResourceSample;
}

/// Host-wide sampler backed by `sysinfo`
///
/// CPU usage is a delta between refreshes, so readings are only refreshed
/// once `cpu_interval` has passed; samples taken closer together reuse the
/// previous CPU figures. Memory is read fresh every time.
pub struct SysinfoSampler {
    state: Mutex<SamplerState>,
    cpu_interval: Duration,
}

struct SamplerState {
    system: System,
    cpu_refreshed_at: Instant,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self::with_cpu_interval(MINIMUM_CPU_UPDATE_INTERVAL)
    }

    pub fn with_cpu_interval(cpu_interval: Duration) -> Self {
        let mut system = System::new();
        // Prime the first CPU delta
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            state: Mutex::new(SamplerState {
                system,
                cpu_refreshed_at: Instant::now(),
            }),
            cpu_interval: cpu_interval.max(MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SysinfoSampler {
    fn sample(&self) -> ResourceSample {
        let mut state = self.state.lock();
        if state.cpu_refreshed_at.elapsed() >= self.cpu_interval {
            state.system.refresh_cpu();
            state.cpu_refreshed_at = Instant::now();
        }
        state.system.refresh_memory();

        let sys = &state.system;
        let total = sys.total_memory() as f64;
        let memory_percent = if total > 0.0 {
            (sys.used_memory() as f64 / total * 100.0) as f32
        } else {
            0.0
        };

        ResourceSample {
            cpu_overall: sys.global_cpu_info().cpu_usage(),
            cpu_per_core: sys.cpus().iter().map(|c| c.cpu_usage()).collect(),
            memory_percent,
        }
    }
}

/// Sampler returning the same reading every time
#[derive(Debug, Clone, Default)]
pub struct FixedSampler(pub ResourceSample);

impl ResourceSampler for FixedSampler {
    fn sample(&self) -> ResourceSample {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f32, cores: &[f32], mem: f32) -> ResourceSample {
        ResourceSample {
            cpu_overall: cpu,
            cpu_per_core: cores.to_vec(),
            memory_percent: mem,
        }
    }

    #[test]
    fn test_mean_of_nothing() {
        assert_eq!(ResourceSample::mean(&[]), None);
    }

    #[test]
    fn test_mean_component_wise() {
        let samples = vec![sample(10.0, &[20.0, 0.0], 40.0), sample(30.0, &[40.0, 10.0], 60.0)];
        let mean = ResourceSample::mean(&samples).unwrap();

        assert_eq!(mean.cpu_overall, 20.0);
        assert_eq!(mean.cpu_per_core, vec![30.0, 5.0]);
        assert_eq!(mean.memory_percent, 50.0);
    }

    #[test]
    fn test_mean_with_uneven_core_counts() {
        let samples = vec![sample(0.0, &[10.0], 0.0), sample(0.0, &[30.0, 50.0], 0.0)];
        let mean = ResourceSample::mean(&samples).unwrap();
        assert_eq!(mean.cpu_per_core, vec![20.0, 50.0]);
    }

    #[test]
    fn test_sysinfo_sampler_in_range() {
        let s = SysinfoSampler::new().sample();
        assert!(s.memory_percent >= 0.0 && s.memory_percent <= 100.0);
        assert!(s.cpu_per_core.iter().all(|c| *c >= 0.0));
    }

    #[test]
    fn test_back_to_back_samples_reuse_cpu_readings() {
        let sampler = SysinfoSampler::with_cpu_interval(Duration::from_secs(3600));
        let (first, second) = (sampler.sample(), sampler.sample());

        assert_eq!(first.cpu_overall, second.cpu_overall);
        assert_eq!(first.cpu_per_core, second.cpu_per_core);
        assert_eq!(sampler.state.lock().system.cpus().len(), first.cpu_per_core.len());
    }
}
