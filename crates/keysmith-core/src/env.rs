//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Common environment variable names.
pub mod vars {
    /// Keysmith home directory override.
    pub const KEYSMITH_HOME: &str = "KEYSMITH_HOME";

    /// Keysmith config file override.
    pub const KEYSMITH_CONFIG: &str = "KEYSMITH_CONFIG";

    /// Access group override for store instances built from config.
    pub const KEYSMITH_ACCESS_GROUP: &str = "KEYSMITH_ACCESS_GROUP";

    /// Log filter (EnvFilter syntax).
    pub const KEYSMITH_LOG: &str = "KEYSMITH_LOG";
}
