use std::env;

use serde_json::{Value, json};

use crate::plugins::podtopologyspread::Weighting;

#[derive(Debug, Clone)]
pub struct Config {
    pub apiserver: String,
    pub queue_capacity: usize,
    pub spread_weighting: Weighting,
}

impl Config {
    /// Arguments handed to the spread plugin, in their opaque JSON form.
    pub fn spread_args(&self) -> Value {
        json!({ "weighting": self.spread_weighting.to_string() })
    }
}

pub fn load_config() -> Result<Config, String> {
    config_from(|key| env::var(key).ok())
}

fn config_from(var: impl Fn(&str) -> Option<String>) -> Result<Config, String> {
    let server_address = var("R8S_SERVER_HOST").unwrap_or_else(|| "localhost".to_string());

    let server_port = var("R8S_SERVER_PORT")
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(7620);

    let queue_capacity = var("R8S_SCHEDULER_QUEUE")
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(100);

    let spread_weighting = match var("R8S_SPREAD_WEIGHTING") {
        Some(raw) => raw.parse::<Weighting>()?,
        None => Weighting::default(),
    };

    Ok(Config {
        apiserver: format!("http://{}:{}", server_address, server_port),
        queue_capacity,
        spread_weighting,
    })
}
