//! Filter directive construction.

use std::collections::BTreeMap;

use tracing::Level;

/// Parse a level name (case-insensitive). `warning` is accepted for `warn`.
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Build an `EnvFilter` directive string from a default level and
/// per-module overrides, e.g. `info,huddle_server=debug`.
///
/// Unparseable levels fall back to `info` for the default and are dropped
/// for module overrides.
pub fn build_directives(level: &str, modules: &BTreeMap<String, String>) -> String {
    let default = parse_level(level).unwrap_or(Level::INFO);
    let mut directives = default.to_string().to_lowercase();
    for (module, module_level) in modules {
        if let Some(parsed) = parse_level(module_level) {
            directives.push(',');
            directives.push_str(module);
            directives.push('=');
            directives.push_str(&parsed.to_string().to_lowercase());
        }
    }
    directives
}
