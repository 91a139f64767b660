//! Route configuration - typed, validated at construction time
//!
//! No runtime name lookup: every recognized option is a struct field.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::RouteError;

/// Default delimiter for splitting a single-string itinerary
pub const DEFAULT_DELIMITER: &str = ",";

/// Header the default expression reads the itinerary from
pub const DEFAULT_ROUTING_HEADER: &str = "routing_slip";

/// When the itinerary expression is re-evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Evaluate once before the first step and consume the sequence in order
    #[default]
    Static,
    /// Re-evaluate before every step; earlier steps may legitimately
    /// mutate the message state the expression depends on
    Dynamic,
}

/// Routing-slip engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RouteConfig {
    /// Header the default itinerary expression reads
    #[validate(length(min = 1))]
    pub header: String,

    /// Delimiter used to split a single-string itinerary
    #[validate(length(min = 1))]
    pub delimiter: String,

    /// Skip destinations that cannot be resolved instead of failing
    pub ignore_invalid_endpoints: bool,

    /// Producer cache bound: 0 = default size, negative = caching disabled
    pub cache_size: i32,

    /// Itinerary re-evaluation mode
    pub resolution: ResolutionMode,

    /// Optional per-step deadline in milliseconds
    pub step_timeout_ms: Option<u64>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            header: DEFAULT_ROUTING_HEADER.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            ignore_invalid_endpoints: false,
            cache_size: 0,
            resolution: ResolutionMode::Static,
            step_timeout_ms: None,
        }
    }
}

impl RouteConfig {
    /// Validate the configuration, consuming and returning it
    ///
    /// Returns the first violation as `ConfigValidation`.
    pub fn validated(self) -> Result<Self, RouteError> {
        if let Err(errors) = Validate::validate(&self) {
            if let Some((field, field_errors)) = errors.field_errors().iter().next() {
                let message = field_errors
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "invalid value".to_string());
                return Err(RouteError::config_validation(field.to_string(), message));
            }
            return Err(RouteError::config_validation("<config>", "invalid value"));
        }

        if self.step_timeout_ms == Some(0) {
            return Err(RouteError::config_validation(
                "step_timeout_ms",
                "must be greater than zero when set",
            ));
        }

        Ok(self)
    }
}
