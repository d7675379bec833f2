use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

const APPLICATION_DIR: &str = "pomolog";

/// Directory holding logs, the database and the selected task cache unless the configuration
/// points elsewhere. Uses `$XDG_STATE_HOME` and falls back to `$HOME/.local/state`.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| {
            env::var("HOME").map(|home| {
                let mut path = PathBuf::from(home);
                path.push(".local/state");
                path
            })
        })
        .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
    path.push(APPLICATION_DIR);

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

/// `$HOME/.config/pomo`, one of the places a configuration file is looked up in.
pub fn user_config_dir() -> Option<PathBuf> {
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("pomo"))
}
