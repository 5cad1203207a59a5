use std::env;
use std::path::PathBuf;

use super::schema::Settings;

impl Settings {
    /// Load settings: struct defaults, then the optional TOML file, then
    /// `CARTWALL__*` environment variables on top.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = config_path() {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }
        builder
            .add_source(
                ::config::Environment::with_prefix("CARTWALL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.playlists.is_empty() {
            return Err("playlists must not be empty".to_string());
        }
        if !self.playlists.contains(&self.jingle_playlist) {
            return Err(format!(
                "jingle_playlist '{}' is not one of the configured playlists",
                self.jingle_playlist
            ));
        }
        if self.min_duration_secs <= 0.0 || self.min_jingle_duration_secs <= 0.0 {
            return Err("minimum track durations must be > 0".to_string());
        }
        if self.samplerates.is_empty() {
            return Err("samplerates must not be empty".to_string());
        }
        Ok(())
    }
}

/// Where the config file lives. `CARTWALL_CONFIG_PATH` wins outright;
/// otherwise `$XDG_CONFIG_HOME/cartwall/config.toml`, with
/// `~/.config` standing in when `XDG_CONFIG_HOME` is unset.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os("CARTWALL_CONFIG_PATH") {
        return Some(PathBuf::from(explicit));
    }
    let config_home = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_home.join("cartwall").join("config.toml"))
}
