//! Structured logging helpers
//!
//! Filter construction for `tracing-subscriber` and request correlation ids.

pub mod middleware;

pub use middleware::generate_request_id;

/// Build filter directives string from LoggingConfig
///
/// A filter string in the format:
/// "base_level,augur::component1=level1,augur::component2=level2"
///
/// # Examples
///
/// ```
/// use augur::config::logging::{LogFormat, LoggingConfig};
/// use augur::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("resilience".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// let filter_str = build_filter_directives(&config);
/// assert_eq!(filter_str, "info,augur::resilience=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",augur::{}={}", component, level));
        }
    }

    filter_str
}
