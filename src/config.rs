//! Kernel configuration.
//!
//! Plain data; the kernel parses no configuration language. With the `config`
//! feature the types derive serde traits so a host application can load them
//! from whatever format it already uses.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// What a pooled resolve does when every instance is borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum ExhaustionPolicy {
    /// Wait until another caller releases an instance
    #[default]
    Block,
    /// Fail with [`KernelError::PoolExhausted`](crate::KernelError::PoolExhausted)
    Fail,
}

/// Defaults for pooled components that do not size their own pool.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct PoolConfig {
    /// Instances created on first use
    pub initial_size: usize,
    /// Upper bound on idle plus borrowed instances
    pub max_size: usize,
    /// Behavior when the pool is at capacity
    pub exhaustion: ExhaustionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 5,
            max_size: 15,
            exhaustion: ExhaustionPolicy::Block,
        }
    }
}

/// Kernel-wide settings.
///
/// # Examples
///
/// ```
/// use ferrous_kernel::{ExhaustionPolicy, KernelBuilder, KernelConfig};
///
/// let mut config = KernelConfig::default();
/// config.pool.exhaustion = ExhaustionPolicy::Fail;
/// config.max_depth = 64;
///
/// let mut builder = KernelBuilder::new();
/// builder.config(config);
/// let kernel = builder.build();
/// assert!(!kernel.is_disposed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct KernelConfig {
    /// Pool defaults
    pub pool: PoolConfig,
    /// Longest dependency chain a single resolve may walk
    pub max_depth: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            max_depth: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.pool.initial_size, 5);
        assert_eq!(config.pool.max_size, 15);
        assert_eq!(config.pool.exhaustion, ExhaustionPolicy::Block);
        assert_eq!(config.max_depth, 1024);
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_json_keeps_defaults() {
        let config: KernelConfig =
            serde_json::from_str(r#"{ "pool": { "max_size": 3, "exhaustion": "fail" } }"#).unwrap();
        assert_eq!(config.pool.initial_size, 5);
        assert_eq!(config.pool.max_size, 3);
        assert_eq!(config.pool.exhaustion, ExhaustionPolicy::Fail);
        assert_eq!(config.max_depth, 1024);
    }
}
