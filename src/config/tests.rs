use super::load::config_path;
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        std::env::set_var(key, val);
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        std::env::remove_var(key);
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn config_path_prefers_the_explicit_override() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("CARTWALL_CONFIG_PATH", "/tmp/cartwall-test-config.toml");
    let _g2 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-should-not-win");
    assert_eq!(
        config_path().unwrap(),
        std::path::PathBuf::from("/tmp/cartwall-test-config.toml")
    );
}

#[test]
fn config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("CARTWALL_CONFIG_PATH");
    let _g2 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g3 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    assert_eq!(
        config_path().unwrap(),
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("cartwall")
            .join("config.toml")
    );
}

#[test]
fn config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("CARTWALL_CONFIG_PATH");
    let _g2 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g3 = EnvGuard::set("HOME", "/tmp/home-dir");

    assert_eq!(
        config_path().unwrap(),
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("cartwall")
            .join("config.toml")
    );
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
data_dir = "/srv/cartwall/data"
playlists = ["music", "jingles"]
jingle_playlist = "jingles"
min_duration_secs = 10.0
min_jingle_duration_secs = 1.0
samplerates = [44100]
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("CARTWALL_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("CARTWALL__DATA_DIR");

    let s = Settings::load().unwrap();
    assert_eq!(s.data_dir, std::path::PathBuf::from("/srv/cartwall/data"));
    assert_eq!(s.playlists, vec!["music".to_string(), "jingles".to_string()]);
    assert_eq!(s.min_duration_secs, 10.0);
    assert_eq!(s.min_jingle_duration_secs, 1.0);
    assert_eq!(s.samplerates, vec![44100]);
    assert!(s.validate().is_ok());
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
data_dir = "/srv/from-file"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("CARTWALL_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("CARTWALL__DATA_DIR", "/srv/from-env");

    let s = Settings::load().unwrap();
    assert_eq!(s.data_dir, std::path::PathBuf::from("/srv/from-env"));
}

#[test]
fn validate_rejects_unknown_jingle_playlist() {
    let mut s = Settings::default();
    s.jingle_playlist = "carts".to_string();
    assert!(s.validate().is_err());
}

#[test]
fn min_duration_depends_on_playlist() {
    let s = Settings::default();
    assert_eq!(s.min_duration_for("music"), 5.0);
    assert_eq!(s.min_duration_for("jingles"), 0.5);
}

#[test]
fn data_paths_are_rooted_at_data_dir() {
    let s = Settings::with_data_dir("/srv/data");
    assert_eq!(
        s.playlist_dir("music"),
        std::path::PathBuf::from("/srv/data/music")
    );
    assert_eq!(
        s.ordering_path("music"),
        std::path::PathBuf::from("/srv/data/music.m3u")
    );
    assert_eq!(s.index_path(), std::path::PathBuf::from("/srv/data/index.json"));
    assert_eq!(s.log_dir(), std::path::PathBuf::from("/srv/data/log"));
}
