//! Fallback table configuration

use crate::fallback::{default_strategies, FallbackStrategy};
use serde::{Deserialize, Serialize};

/// `[fallback]` section
///
/// An absent section yields the built-in strategies; an explicit empty
/// `strategies = []` disables recovery beyond each stage's own fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub strategies: Vec<FallbackStrategy>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
        }
    }
}
