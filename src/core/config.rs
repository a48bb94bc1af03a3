use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Nominal tick interval; also the divisor for per-second disk rates.
    pub tick_interval_ms: u64,
    pub resolve_usernames: bool,
    pub resolve_icons: bool,
    pub resolve_command_lines: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            resolve_usernames: true,
            resolve_icons: true,
            resolve_command_lines: true,
        }
    }
}

impl ProcessConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// GPU aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// EMA weight of the newest sample.
    pub ema_alpha: f64,
    /// Consecutive all-idle ticks before counter handles are rebuilt.
    pub zero_streak_threshold: u32,
    pub instance_refresh_ticks: u32,
    pub max_aggregated_instances: usize,
    pub max_per_process_instances: usize,
    pub memory_cache_ttl_ms: u64,
    pub timing_sample_gap_ms: u64,
    pub min_sampling_interval_ms: u64,
    pub enable_secondary_provider: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.4,
            zero_streak_threshold: 5,
            instance_refresh_ticks: 30,
            max_aggregated_instances: 12,
            max_per_process_instances: 64,
            memory_cache_ttl_ms: 1000,
            timing_sample_gap_ms: 120,
            min_sampling_interval_ms: 250,
            enable_secondary_provider: true,
        }
    }
}

impl GpuConfig {
    pub fn memory_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.memory_cache_ttl_ms)
    }

    pub fn timing_sample_gap(&self) -> Duration {
        Duration::from_millis(self.timing_sample_gap_ms)
    }

    pub fn min_sampling_interval(&self) -> Duration {
        Duration::from_millis(self.min_sampling_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub process: ProcessConfig,
    pub gpu: GpuConfig,
}

impl EngineConfig {
    /// Load from the user config directory. A missing file yields defaults,
    /// and so does an unparsable one (with a warning).
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = match serde_json::from_str::<EngineConfig>(&data) {
            Ok(config) => config.validate(),
            Err(e) => {
                warn!("Ignoring unparsable config {:?}: {}", path, e);
                Self::default()
            }
        };

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, data).with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("taskscope").join("config.json"))
    }

    /// Clamp every setting into its usable range.
    pub fn validate(mut self) -> Self {
        let alpha = self.gpu.ema_alpha;
        self.gpu.ema_alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            GpuConfig::default().ema_alpha
        };
        self.gpu.zero_streak_threshold = self.gpu.zero_streak_threshold.max(1);
        self.gpu.instance_refresh_ticks = self.gpu.instance_refresh_ticks.max(1);
        self.gpu.max_aggregated_instances = self.gpu.max_aggregated_instances.max(1);
        self.gpu.max_per_process_instances = self
            .gpu
            .max_per_process_instances
            .max(self.gpu.max_aggregated_instances);
        self.process.tick_interval_ms = self.process.tick_interval_ms.max(1);
        self
    }
}
