//! Configuration vault – reads/writes `~/.cathrig/config.toml`.

use cathrig_types::RigConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Mechanical shape of the simulated rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyKind {
    Single,
    #[default]
    Dual,
}

impl std::fmt::Display for AssemblyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssemblyKind::Single => write!(f, "single"),
            AssemblyKind::Dual => write!(f, "dual"),
        }
    }
}

/// Layout of the simulated bench the shell drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimLayout {
    pub assembly: AssemblyKind,
    /// End stops sit this many steps either side of power-on position.
    pub travel_steps: i64,
    /// Use the wall clock for dwells and settle delays instead of the
    /// instant virtual clock.
    pub realtime: bool,
}

impl Default for SimLayout {
    fn default() -> Self {
        Self {
            assembly: AssemblyKind::Dual,
            travel_steps: 60_000,
            realtime: false,
        }
    }
}

/// Persisted operator configuration stored in `~/.cathrig/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub sim: SimLayout,
}

/// Return the path to `~/.cathrig/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".cathrig").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `CATHRIG_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CATHRIG_NOMINAL_SPEED` | `rig.motion.nominal_speed` |
/// | `CATHRIG_STEPS_PER_REV` | `rig.motion.steps_per_revolution` |
/// | `CATHRIG_MAX_RECOVERIES` | `rig.safety.max_recoveries` |
/// | `CATHRIG_BARE_BACKOFF_THRESHOLD` | `rig.safety.top_limit_bare_backoff_threshold` (`off` disables) |
/// | `CATHRIG_ASSEMBLY` | `sim.assembly` (`single` or `dual`) |
/// | `CATHRIG_REALTIME` | `sim.realtime` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CATHRIG_NOMINAL_SPEED")
        && let Ok(speed) = v.parse::<f32>()
    {
        cfg.rig.motion.nominal_speed = speed;
    }
    if let Ok(v) = std::env::var("CATHRIG_STEPS_PER_REV")
        && let Ok(steps) = v.parse::<i64>()
    {
        cfg.rig.motion.steps_per_revolution = steps;
    }
    if let Ok(v) = std::env::var("CATHRIG_MAX_RECOVERIES")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.rig.safety.max_recoveries = n;
    }
    if let Ok(v) = std::env::var("CATHRIG_BARE_BACKOFF_THRESHOLD") {
        if v.eq_ignore_ascii_case("off") {
            cfg.rig.safety.top_limit_bare_backoff_threshold = None;
        } else if let Ok(steps) = v.parse::<i64>() {
            cfg.rig.safety.top_limit_bare_backoff_threshold = Some(steps);
        }
    }
    if let Ok(v) = std::env::var("CATHRIG_ASSEMBLY") {
        match v.to_ascii_lowercase().as_str() {
            "single" => cfg.sim.assembly = AssemblyKind::Single,
            "dual" => cfg.sim.assembly = AssemblyKind::Dual,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("CATHRIG_REALTIME")
        && let Ok(realtime) = v.parse::<bool>()
    {
        cfg.sim.realtime = realtime;
    }
}

/// Save the config to disk, creating `~/.cathrig/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");

        assert_eq!(loaded.rig.geometry, RigConfig::default().geometry);
        assert_eq!(loaded.rig.clamp, RigConfig::default().clamp);
        assert_eq!(loaded.sim.travel_steps, 60_000);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[rig.motion]\nacceleration = 800.0\n\n[sim]\ntravel_steps = 5000\n",
        )
        .expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.rig.motion.acceleration, 800.0);
        assert_eq!(loaded.rig.motion.steps_per_revolution, 2000);
        assert_eq!(loaded.rig.clamp.dwell_ms, 2500);
        assert_eq!(loaded.sim.travel_steps, 5000);
        assert!(!loaded.sim.realtime);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rig.motion\nnominal_speed = ").expect("write");
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn config_path_points_to_cathrig_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".cathrig"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn apply_env_overrides_changes_nominal_speed() {
        // SAFETY: the variable is only touched by this test.
        unsafe { std::env::set_var("CATHRIG_NOMINAL_SPEED", "125.5") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.rig.motion.nominal_speed, 125.5);
        unsafe { std::env::remove_var("CATHRIG_NOMINAL_SPEED") };
    }

    #[test]
    fn apply_env_overrides_disables_bare_backoff() {
        // SAFETY: the variable is only touched by this test.
        unsafe { std::env::set_var("CATHRIG_BARE_BACKOFF_THRESHOLD", "off") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.rig.safety.top_limit_bare_backoff_threshold, None);
        unsafe { std::env::remove_var("CATHRIG_BARE_BACKOFF_THRESHOLD") };
    }

    #[test]
    fn apply_env_overrides_selects_assembly() {
        // SAFETY: the variable is only touched by this test.
        unsafe { std::env::set_var("CATHRIG_ASSEMBLY", "Single") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sim.assembly, AssemblyKind::Single);
        unsafe { std::env::remove_var("CATHRIG_ASSEMBLY") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_numbers() {
        // SAFETY: the variable is only touched by this test.
        unsafe { std::env::set_var("CATHRIG_MAX_RECOVERIES", "many") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.rig.safety.max_recoveries, 8);
        unsafe { std::env::remove_var("CATHRIG_MAX_RECOVERIES") };
    }
}
