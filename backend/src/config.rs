use std::{env, str::FromStr};

use crate::season::{clock, SeasonPolicy};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    /// In-process maps, optionally snapshotted to `STORE_SNAPSHOT_PATH`.
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub store_backend: StoreBackend,
    pub snapshot_path: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub admin_token: Option<String>,
    pub auto_rollover: bool,
    pub pick_interval_secs: Option<u64>,
    pub default_season_weeks: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(v) if v.eq_ignore_ascii_case("memory") || v.eq_ignore_ascii_case("file") => {
                StoreBackend::Memory
            }
            Ok(v) if !v.eq_ignore_ascii_case("sqlite") => {
                tracing::warn!("Unknown STORE_BACKEND {:?}; using sqlite", v);
                StoreBackend::Sqlite
            }
            _ => StoreBackend::Sqlite,
        };

        let admin_token = env::var("ADMIN_TOKEN").ok().filter(|t| !t.trim().is_empty());
        if admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN is not set; admin endpoints will refuse every request.");
        }

        let default_season_weeks = clock::clamp_season_length(parse_var(
            "DEFAULT_SEASON_WEEKS",
            clock::DEFAULT_SEASON_WEEKS,
        ));

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:movie_club.db".to_string()),
            store_backend,
            snapshot_path: env::var("STORE_SNAPSHOT_PATH").ok().filter(|p| !p.is_empty()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 3000),
            admin_token,
            auto_rollover: parse_var("AUTO_ROLLOVER", true),
            pick_interval_secs: Some(parse_var::<u64>("PICK_INTERVAL_SECS", 0))
                .filter(|secs| *secs > 0),
            default_season_weeks,
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn season_policy(&self) -> SeasonPolicy {
        SeasonPolicy {
            auto_rollover: self.auto_rollover,
            default_season_weeks: self.default_season_weeks,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`
/// (with a warning) when it is unset or malformed.
fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{} has invalid value {:?}; using {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
