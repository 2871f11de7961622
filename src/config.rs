/***************************************/
/*        3rd party libraries          */
/***************************************/
use log::warn;
use serde::Deserialize;
use std::fs;

/***************************************/
/*             Constants               */
/***************************************/
const CONFIG_FILE: &str = "config.toml";

/***************************************/
/*       Public data structures        */
/***************************************/
#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerConfig,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ControllerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ControllerConfig {
    fn default() -> ControllerConfig {
        ControllerConfig {
            address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ControllerConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/***************************************/
/*             Public API              */
/***************************************/

/// Loads the optional configuration file; every field has a default so a
/// missing file means the stock local setup.
pub fn load_config() -> Config {
    match fs::read_to_string(CONFIG_FILE) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring malformed {}: {}", CONFIG_FILE, e);
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}
