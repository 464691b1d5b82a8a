//! Server configuration from the environment.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

pub const ADDR_ENV: &str = "SKETCHGUESS_ADDR";
pub const TEACHERS_ENV: &str = "SKETCHGUESS_TEACHERS";
pub const ROUND_SECONDS_ENV: &str = "SKETCHGUESS_ROUND_SECONDS";

/// Default turn length.
pub const DEFAULT_ROUND_SECONDS: u32 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SKETCHGUESS_ADDR is not a socket address: {0}")]
    Addr(String),
    #[error("SKETCHGUESS_ROUND_SECONDS must be a positive number of seconds: {0}")]
    RoundSeconds(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// User ids that hold the teacher role. The only source of roles.
    pub teachers: HashSet<String>,
    pub round_seconds: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            teachers: HashSet::new(),
            round_seconds: DEFAULT_ROUND_SECONDS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(ADDR_ENV) {
            config.addr = addr.trim().parse().map_err(|_| ConfigError::Addr(addr.clone()))?;
        }
        if let Some(list) = lookup(TEACHERS_ENV) {
            config.teachers = list
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(seconds) = lookup(ROUND_SECONDS_ENV) {
            config.round_seconds = match seconds.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::RoundSeconds(seconds)),
            };
        }
        Ok(config)
    }

    pub fn is_teacher(&self, user_id: &str) -> bool {
        self.teachers.contains(user_id)
    }
}
