use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::entity::ActorId;

const DEFAULT_BUS_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub actor_id: Option<ActorId>,
    pub bus_capacity: usize,
}

impl Config {
    /// Read settings from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup("MAHALLA_DB_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => {
                // We use ~/.mahalla/mahalla.db
                let home_dir = lookup("HOME").unwrap_or_else(|| ".".into());
                PathBuf::from(home_dir).join(".mahalla").join("mahalla.db")
            }
        };

        let actor_id = lookup("MAHALLA_ACTOR_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(ActorId::new);

        let bus_capacity = match lookup("MAHALLA_BUS_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAHALLA_BUS_CAPACITY is not a number: {:?}", raw))?
                .max(1),
            None => DEFAULT_BUS_CAPACITY,
        };

        Ok(Self {
            db_path,
            actor_id,
            bus_capacity,
        })
    }
}
