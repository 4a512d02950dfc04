//! Process settings read from the environment (after `dotenvy` has loaded `.env`).

use crate::error::ConfigError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// Largest accepted request body.
    pub body_limit_bytes: usize,
    /// Directory holding an alternate catalog; the embedded one is used when unset.
    pub catalog_path: Option<PathBuf>,
    /// Run the seed routine after migrations when serving.
    pub seed_on_start: bool,
}

impl Settings {
    /// | Env Var              | Default                            |
    /// |----------------------|------------------------------------|
    /// | `DATABASE_URL`       | `postgres://localhost/starwars`    |
    /// | `HOST`               | `127.0.0.1`                        |
    /// | `PORT`               | `3000`                             |
    /// | `DB_MAX_CONNECTIONS` | `5`                                |
    /// | `BODY_LIMIT_BYTES`   | `65536`                            |
    /// | `CATALOG_PATH`       | unset                              |
    /// | `SEED_ON_START`      | `false`                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/starwars".into());
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port = parse_var(&lookup, "PORT", 3000)?;
        let max_connections = parse_var(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        let body_limit_bytes = parse_var(&lookup, "BODY_LIMIT_BYTES", 64 * 1024)?;
        let catalog_path = lookup("CATALOG_PATH").filter(|s| !s.is_empty()).map(PathBuf::from);
        let seed_on_start = match lookup("SEED_ON_START") {
            None => false,
            Some(v) => match v.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: "SEED_ON_START",
                        reason: format!("expected a boolean, got '{}'", v),
                    })
                }
            },
        };
        Ok(Settings {
            database_url,
            host,
            port,
            max_connections,
            body_limit_bytes,
            catalog_path,
            seed_on_start,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
            var,
            reason: e.to_string(),
        }),
    }
}
