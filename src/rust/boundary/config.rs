use std::env;

/// What the boundary does when the core reports a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Log the error and abort the process
    #[default]
    Abort,
    /// Raise a host exception and return a null result
    Throw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryConfig {
    pub fatal_policy: FatalPolicy,
}

fn parse_fatal(value: &str) -> Option<FatalPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "abort" => Some(FatalPolicy::Abort),
        "throw" => Some(FatalPolicy::Throw),
        _ => None,
    }
}

impl BoundaryConfig {
    /// Defaults overridden by `IMGCLASS_ON_FATAL` (`abort` or `throw`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var("IMGCLASS_ON_FATAL") {
            match parse_fatal(&value) {
                Some(policy) => config.fatal_policy = policy,
                None => log::warn!("Ignoring IMGCLASS_ON_FATAL={}", value),
            }
        }
        config
    }
}
