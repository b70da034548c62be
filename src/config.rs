//! Engine configuration: archive limits, compression and recalculation policy

/// Default per-part inflate limit (256 MiB)
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024;
/// Default inflate limit for the whole package (512 MiB)
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024;

/// Settings shared by load and save.
///
/// Build one with [`EngineConfig::builder`] or read overrides from the
/// environment with [`EngineConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deflate level (0-9) for parts that are rewritten
    pub compression_level: u32,
    /// Largest inflated size accepted for a single part
    pub max_part_bytes: u64,
    /// Largest inflated size accepted across all parts read
    pub max_total_bytes: u64,
    /// Remove `xl/calcChain.xml` once any worksheet is rewritten
    pub drop_calc_chain: bool,
    /// Ask the opening application to recalculate when formulas were written
    pub full_calc_on_load: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            compression_level: 6,
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            drop_calc_chain: true,
            full_calc_on_load: true,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Defaults, overridden by `XLSXEDIT_COMPRESSION_LEVEL`, `XLSXEDIT_MAX_PART_MB`
    /// and `XLSXEDIT_MAX_TOTAL_MB` when they are set and parse.
    pub fn from_env() -> Self {
        EngineConfig::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str| var(key).and_then(|raw| parse_number(key, &raw));
        let mut config = EngineConfig::default();
        if let Some(level) = number("XLSXEDIT_COMPRESSION_LEVEL") {
            config.compression_level = level.min(9) as u32;
        }
        if let Some(mb) = number("XLSXEDIT_MAX_PART_MB") {
            config.max_part_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(mb) = number("XLSXEDIT_MAX_TOTAL_MB") {
            config.max_total_bytes = mb.saturating_mul(1024 * 1024);
        }
        config
    }
}

fn parse_number(key: &str, raw: &str) -> Option<u64> {
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a non-negative integer");
            None
        }
    }
}
