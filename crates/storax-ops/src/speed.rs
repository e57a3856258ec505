//! One-shot write-speed probe driving the adaptive copy threshold.

use std::fs::{self, File};
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use tracing::debug;

use storax_core::EngineConfig;

static THRESHOLD: OnceLock<u64> = OnceLock::new();

/// Byte threshold above which a copy goes transactional.
///
/// Measured once per process as `0.3 × write bytes/sec`, by timing a probe
/// buffer written to the cache area through an fsync'd close. Falls back to
/// the configured constant when the probe cannot run.
pub fn adaptive_threshold(config: &EngineConfig) -> u64 {
    *THRESHOLD.get_or_init(|| match measure_write_speed(config) {
        Some(bps) => {
            let threshold = (bps as f64 * 0.3) as u64;
            debug!(bps, threshold, "write speed probe complete");
            threshold.max(1)
        }
        None => {
            debug!(
                fallback = config.fallback_threshold_bytes,
                "write speed probe failed, using fallback threshold"
            );
            config.fallback_threshold_bytes
        }
    })
}

fn measure_write_speed(config: &EngineConfig) -> Option<u64> {
    let cache_dir = config.cache_dir();
    fs::create_dir_all(&cache_dir).ok()?;
    let probe_path = cache_dir.join("write_probe.bin");

    let buffer = vec![0u8; config.speed_probe_bytes as usize];
    let start = Instant::now();
    let result = (|| {
        let mut file = File::create(&probe_path)?;
        file.write_all(&buffer)?;
        file.sync_all()?;
        Ok::<_, std::io::Error>(())
    })();
    let elapsed = start.elapsed();
    let _ = fs::remove_file(&probe_path);
    result.ok()?;

    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((config.speed_probe_bytes as f64 / secs) as u64)
}
