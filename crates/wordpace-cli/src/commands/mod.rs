pub mod config;
pub mod journal;
pub mod run;
pub mod sequence;

use std::path::Path;

use wordpace_core::Config;

/// `--config` if given, otherwise the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}
