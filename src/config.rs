// Copyright 2025 Simo Sorce
// See LICENSE.txt file for terms

use std::env;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::pkcs11::CK_SLOT_ID;

use serde::{Deserialize, Serialize};
use toml;

pub const DEFAULT_CONF_NAME: &str = "p11client.conf";

/// Environment variable pointing at the configuration file
pub const CONF_ENV: &str = "P11CLIENT_CONF";

/// Environment variable naming the provider module, as used by SoftHSM
pub const MODULE_ENV: &str = "SOFTHSM2_LIB";

fn default_token_present() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the Cryptoki provider module
    pub module: Option<String>,
    /// Slot used when none is given on the command line
    pub slot: Option<CK_SLOT_ID>,
    /// User PIN, for non interactive runs only
    pub pin: Option<String>,
    /// Whether slot listings only report slots with a token
    #[serde(default = "default_token_present")]
    pub token_present: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub fn new() -> Config {
        Config {
            module: None,
            slot: None,
            pin: None,
            token_present: true,
        }
    }

    pub fn find_conf() -> Result<String> {
        /* First check for our own env var,
         * this has the highest precedence */
        if let Ok(var) = env::var(CONF_ENV) {
            return Ok(var);
        }
        let datafile = match env::var("XDG_CONFIG_HOME") {
            Ok(xdg) => format!("{}/p11client/{}", xdg, DEFAULT_CONF_NAME),
            Err(_) => match env::var("HOME") {
                Ok(home) => {
                    format!("{}/.config/p11client/{}", home, DEFAULT_CONF_NAME)
                }
                Err(_) => {
                    return Err(Error::config(
                        "no configuration directory available".to_string(),
                    ))
                }
            },
        };
        if Path::new(&datafile).is_file() {
            Ok(datafile)
        } else {
            Err(Error::config(format!("{} not found", datafile)))
        }
    }

    pub fn from_file(filename: &str) -> Result<Config> {
        let config_str = fs::read_to_string(filename).map_err(|e| {
            Error::config(format!("failed to read {}: {}", filename, e))
        })?;
        Self::parse(&config_str)
    }

    pub fn parse(config_str: &str) -> Result<Config> {
        let conf: Config = toml::from_str(config_str)?;
        Ok(conf)
    }

    /// Loads the configuration file if one can be found
    ///
    /// A missing file yields the default configuration, a file that exists
    /// but can't be parsed is an error.
    pub fn default_config() -> Result<Config> {
        match Self::find_conf() {
            Ok(filename) => Self::from_file(&filename),
            Err(_) => Ok(Config::new()),
        }
    }

    /// Returns the provider module path
    ///
    /// The environment variable takes precedence over the file.
    pub fn module_path(&self) -> Result<String> {
        if let Ok(path) = env::var(MODULE_ENV) {
            if !path.is_empty() {
                return Ok(path);
            }
        }
        match &self.module {
            Some(path) if !path.is_empty() => Ok(path.clone()),
            _ => Err(Error::config(format!(
                "provider module path not configured, \
                 set {} or the module option",
                MODULE_ENV
            ))),
        }
    }

    pub fn slot(&self) -> Result<CK_SLOT_ID> {
        match self.slot {
            Some(slot) => Ok(slot),
            None => Err(Error::config("no slot configured".to_string())),
        }
    }
}
