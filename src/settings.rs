//! View settings, persisted as JSON in the user's config directory.

use crate::errors::Result;
use json::JsonValue;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub z_near: f32,
    pub z_far: f32,
    /// Vertical field of view, in degrees.
    pub fov_y: f32,
    /// World units per second.
    pub movement_speed: f32,
    /// Radians per pixel of mouse motion.
    pub rotation_speed: f32,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            z_near: 1.0,
            z_far: 10000.0,
            fov_y: 60.0,
            movement_speed: 300.0,
            rotation_speed: 0.004,
            window_width: 800,
            window_height: 600,
        }
    }
}

/// `$XDG_CONFIG_HOME/j3dview/settings.json`, or under `$HOME/.config`.
fn settings_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let config = match xdg_config_home.filter(|s| !s.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(home.filter(|s| !s.is_empty())?).join(".config"),
    };
    Some(config.join("j3dview").join("settings.json"))
}

pub fn settings_path() -> Option<PathBuf> {
    settings_path_from(std::env::var_os("XDG_CONFIG_HOME"), std::env::var_os("HOME"))
}

fn read_f32(v: &JsonValue, key: &str, field: &mut f32, valid: fn(f32) -> bool) {
    if v[key].is_null() {
        return;
    }
    match v[key].as_f32() {
        Some(x) if x.is_finite() && valid(x) => *field = x,
        _ => warn!("settings: bad value for {}: {}", key, v[key].dump()),
    }
}

fn read_u32(v: &JsonValue, key: &str, field: &mut u32) {
    if v[key].is_null() {
        return;
    }
    match v[key].as_u32() {
        Some(x) if x > 0 => *field = x,
        _ => warn!("settings: bad value for {}: {}", key, v[key].dump()),
    }
}

impl Settings {
    /// Reads settings from JSON. Absent keys keep their default; keys
    /// with bad values are reset to the default with a warning.
    pub fn from_json(s: &str) -> Result<Settings> {
        let v = json::parse(s)?;
        if !v.is_object() {
            bail!("settings should be a JSON object");
        }
        let mut settings = Settings::default();
        read_f32(&v, "z_near", &mut settings.z_near, |x| x > 0.0);
        read_f32(&v, "z_far", &mut settings.z_far, |x| x > 0.0);
        read_f32(&v, "fov_y", &mut settings.fov_y, |x| x > 0.0 && x < 180.0);
        read_f32(&v, "movement_speed", &mut settings.movement_speed, |x| x > 0.0);
        read_f32(&v, "rotation_speed", &mut settings.rotation_speed, |x| x > 0.0);
        read_u32(&v, "window_width", &mut settings.window_width);
        read_u32(&v, "window_height", &mut settings.window_height);
        if settings.z_far <= settings.z_near {
            warn!("settings: z_far ({}) not beyond z_near ({}), using defaults",
                settings.z_far, settings.z_near);
            let default = Settings::default();
            settings.z_near = default.z_near;
            settings.z_far = default.z_far;
        }
        Ok(settings)
    }

    pub fn to_json(&self) -> String {
        let mut v = JsonValue::new_object();
        v["z_near"] = self.z_near.into();
        v["z_far"] = self.z_far.into();
        v["fov_y"] = self.fov_y.into();
        v["movement_speed"] = self.movement_speed.into();
        v["rotation_speed"] = self.rotation_speed.into();
        v["window_width"] = self.window_width.into();
        v["window_height"] = self.window_height.into();
        v.pretty(2)
    }

    /// Loads the saved settings. Never fails; problems are logged and
    /// the defaults used instead.
    pub fn load() -> Settings {
        let path = match settings_path() {
            Some(path) => path,
            None => {
                debug!("settings: no config directory");
                return Settings::default();
            }
        };
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("settings: {} doesn't exist", path.display());
                return Settings::default();
            }
            Err(e) => {
                warn!("settings: couldn't read {}: {}", path.display(), e);
                return Settings::default();
            }
        };
        match Settings::from_json(&s) {
            Ok(settings) => {
                debug!("settings: loaded {}", path.display());
                settings
            }
            Err(e) => {
                warn!("settings: {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Saves settings. Failure is only a warning.
    pub fn save(&self) {
        let path = match settings_path() {
            Some(path) => path,
            None => return,
        };
        let res = (|| -> Result<()> {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&path, self.to_json())?;
            Ok(())
        })();
        match res {
            Ok(()) => debug!("settings: saved {}", path.display()),
            Err(e) => warn!("settings: couldn't save {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(
            settings_path_from(Some("/x".into()), Some("/home/u".into())),
            Some(PathBuf::from("/x/j3dview/settings.json")),
        );
        assert_eq!(
            settings_path_from(Some("".into()), Some("/home/u".into())),
            Some(PathBuf::from("/home/u/.config/j3dview/settings.json")),
        );
        assert_eq!(settings_path_from(None, None), None);
    }

    #[test]
    fn json_roundtrip() {
        let settings = Settings { fov_y: 45.0, window_width: 1024, ..Settings::default() };
        assert_eq!(Settings::from_json(&settings.to_json()).unwrap(), settings);
    }

    #[test]
    fn partial_and_bad_values() {
        let s = Settings::from_json(r#"{"fov_y": 90, "z_near": -1, "window_height": "tall"}"#).unwrap();
        assert_eq!(s.fov_y, 90.0);
        assert_eq!(s.z_near, Settings::default().z_near);
        assert_eq!(s.window_height, Settings::default().window_height);

        let s = Settings::from_json(r#"{"z_near": 50, "z_far": 10}"#).unwrap();
        assert_eq!((s.z_near, s.z_far), (1.0, 10000.0));

        assert!(Settings::from_json("[1, 2]").is_err());
        assert!(Settings::from_json("{").is_err());
    }
}
