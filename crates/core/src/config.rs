//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services
//! (`Arc<CoreConfig>`). The core never reads environment variables itself; binaries collect
//! the raw values with [`ConfigValues::from_lookup`] and hand them to
//! [`CoreConfig::from_env_values`].

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_OPEN_SECTOR_LABELS, DEFAULT_ROOM_PREFIX_LEN, ENV_DATA_DIR,
    ENV_OPEN_SECTOR_LABELS, ENV_PROTECTED_MAX_AGE, ENV_PROTECTED_MIN_AGE, ENV_ROOM_PREFIX_LEN,
    PROTECTED_PATHWAY_MAX_AGE, PROTECTED_PATHWAY_MIN_AGE, SURGICAL_RECOVERY_ORIGIN,
};
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};

/// Raw, unvalidated configuration values as found in the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigValues {
    pub data_dir: Option<String>,
    /// Comma-separated sector type labels.
    pub open_sector_labels: Option<String>,
    pub protected_min_age: Option<String>,
    pub protected_max_age: Option<String>,
    pub room_prefix_len: Option<String>,
}

impl ConfigValues {
    /// Collect every known key through `lookup` (usually `std::env::var(key).ok()`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            data_dir: lookup(ENV_DATA_DIR),
            open_sector_labels: lookup(ENV_OPEN_SECTOR_LABELS),
            protected_min_age: lookup(ENV_PROTECTED_MIN_AGE),
            protected_max_age: lookup(ENV_PROTECTED_MAX_AGE),
            room_prefix_len: lookup(ENV_ROOM_PREFIX_LEN),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    protected_min_age: u32,
    protected_max_age: u32,
    room_prefix_len: usize,
    surgical_recovery_origin: String,
    open_sector_labels: Vec<String>,
}

impl CoreConfig {
    /// Create a `CoreConfig` with the default clinical rules.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            protected_min_age: PROTECTED_PATHWAY_MIN_AGE,
            protected_max_age: PROTECTED_PATHWAY_MAX_AGE,
            room_prefix_len: DEFAULT_ROOM_PREFIX_LEN,
            surgical_recovery_origin: SURGICAL_RECOVERY_ORIGIN.to_string(),
            open_sector_labels: DEFAULT_OPEN_SECTOR_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
        }
    }

    /// Override the protected-care-pathway age bounds (both inclusive).
    pub fn with_protected_age_bounds(mut self, min: u32, max: u32) -> CoreResult<Self> {
        if min > max {
            return Err(CoreError::InvalidInput(format!(
                "protected pathway age bounds are inverted: {min} > {max}"
            )));
        }
        self.protected_min_age = min;
        self.protected_max_age = max;
        Ok(self)
    }

    pub fn with_room_prefix_len(mut self, len: usize) -> CoreResult<Self> {
        if len == 0 {
            return Err(CoreError::InvalidInput(
                "room prefix length must be at least 1".into(),
            ));
        }
        self.room_prefix_len = len;
        Ok(self)
    }

    pub fn with_open_sector_labels(mut self, labels: Vec<String>) -> Self {
        self.open_sector_labels = labels;
        self
    }

    /// Build a configuration from raw environment values.
    ///
    /// Blank or missing values keep the defaults. Numbers that do not parse, inverted age
    /// bounds and a zero prefix length fail with [`CoreError::InvalidInput`].
    pub fn from_env_values(values: ConfigValues) -> CoreResult<Self> {
        let data_dir = non_blank(values.data_dir).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let mut cfg = Self::new(PathBuf::from(data_dir));

        let labels: Vec<String> = values
            .open_sector_labels
            .unwrap_or_default()
            .split(',')
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
        if !labels.is_empty() {
            cfg = cfg.with_open_sector_labels(labels);
        }

        let min_age = parse_number(ENV_PROTECTED_MIN_AGE, values.protected_min_age)?;
        let max_age = parse_number(ENV_PROTECTED_MAX_AGE, values.protected_max_age)?;
        if min_age.is_some() || max_age.is_some() {
            let min = min_age.unwrap_or(cfg.protected_min_age);
            let max = max_age.unwrap_or(cfg.protected_max_age);
            cfg = cfg.with_protected_age_bounds(min, max)?;
        }

        if let Some(len) = parse_number(ENV_ROOM_PREFIX_LEN, values.room_prefix_len)? {
            cfg = cfg.with_room_prefix_len(len)?;
        }

        Ok(cfg)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn protected_min_age(&self) -> u32 {
        self.protected_min_age
    }

    pub fn protected_max_age(&self) -> u32 {
        self.protected_max_age
    }

    pub fn room_prefix_len(&self) -> usize {
        self.room_prefix_len
    }

    pub fn surgical_recovery_origin(&self) -> &str {
        &self.surgical_recovery_origin
    }

    pub fn open_sector_labels(&self) -> &[String] {
        &self.open_sector_labels
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_DATA_DIR))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number<T>(key: &str, value: Option<String>) -> CoreResult<Option<T>>
where
    T: std::str::FromStr,
{
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|_| {
        CoreError::InvalidInput(format!("{key} is not a valid number: {raw}"))
    })
}
