use rand::Rng;
use std::path::PathBuf;
use sysinfo::System;
use tokio::sync::Mutex;

use crate::cluster::types::NodeMetrics;

/// Samples the figures the placement engine ranks datanodes by.
pub struct MetricsSampler {
    system: Mutex<System>,
    storage_path: PathBuf,
}

impl MetricsSampler {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        // The first CPU reading only establishes a baseline.
        system.refresh_cpu();
        Self {
            system: Mutex::new(system),
            storage_path: storage_path.into(),
        }
    }

    pub async fn sample(&self) -> NodeMetrics {
        let load = {
            let mut system = self.system.lock().await;
            system.refresh_cpu();
            f64::from(system.global_cpu_info().cpu_usage()).clamp(0.0, 100.0)
        };

        let available_space = fs2::available_space(&self.storage_path).unwrap_or_else(|e| {
            tracing::warn!(
                "Cannot read free space of {}: {}",
                self.storage_path.display(),
                e
            );
            0
        });

        // Synthetic: nothing measures latency.
        let latency = rand::thread_rng().gen_range(0.1..2.0);

        NodeMetrics {
            load,
            available_space,
            latency,
        }
    }
}
