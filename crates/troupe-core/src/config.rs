//! Configuration for Troupe
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.
//!
//! The delivery retry budget is process-wide and immutable after [`init`]:
//! install it once at startup, read it anywhere via
//! [`default_tries_count`]. Uninitialized processes fall back to
//! [`DELIVERY_TRIES_COUNT_DEFAULT`].

use crate::constants::*;
use crate::error::{Error, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static INSTALLED: OnceCell<TroupeConfig> = OnceCell::new();

/// Main configuration for Troupe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TroupeConfig {
    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Delivery configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

impl TroupeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.delivery.validate()?;
        Ok(())
    }
}

/// Install the process-wide configuration. May be called at most once,
/// before any send uses the default retry budget.
pub fn init(config: TroupeConfig) -> Result<()> {
    config.validate()?;
    INSTALLED
        .set(config)
        .map_err(|_| Error::AlreadyInitialized {
            what: "troupe configuration".into(),
        })
}

/// The installed configuration, or defaults when [`init`] was never called.
pub fn installed() -> TroupeConfig {
    INSTALLED.get().cloned().unwrap_or_default()
}

/// Default number of tries for a reliable send
pub fn default_tries_count() -> usize {
    INSTALLED
        .get()
        .map(|config| config.delivery.default_tries_count)
        .unwrap_or(DELIVERY_TRIES_COUNT_DEFAULT)
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of dispatch loops in the fixed pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    DISPATCHER_POOL_SIZE_DEFAULT
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<()> {
        if self.pool_size < DISPATCHER_POOL_SIZE_MIN {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.pool_size".into(),
                reason: format!("{} is below minimum {}", self.pool_size, DISPATCHER_POOL_SIZE_MIN),
            });
        }
        if self.pool_size > DISPATCHER_POOL_SIZE_MAX {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.pool_size".into(),
                reason: format!("{} exceeds limit {}", self.pool_size, DISPATCHER_POOL_SIZE_MAX),
            });
        }
        Ok(())
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Number of tries for a reliable send when the caller does not
    /// specify one (first attempt included)
    #[serde(default = "default_tries")]
    pub default_tries_count: usize,
}

fn default_tries() -> usize {
    DELIVERY_TRIES_COUNT_DEFAULT
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_tries_count: default_tries(),
        }
    }
}

impl DeliveryConfig {
    fn validate(&self) -> Result<()> {
        if self.default_tries_count == 0 {
            return Err(Error::InvalidConfiguration {
                field: "delivery.default_tries_count".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.default_tries_count > DELIVERY_TRIES_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "delivery.default_tries_count".into(),
                reason: format!(
                    "{} exceeds limit {}",
                    self.default_tries_count, DELIVERY_TRIES_COUNT_MAX
                ),
            });
        }
        Ok(())
    }
}
