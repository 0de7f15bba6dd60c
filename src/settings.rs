use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::StoreError;

/// Settings file name, resolved relative to the working directory.
pub const SETTINGS_FILE: &str = "ArcadeShineFrontendSettings.json";

/// Borderless mpv over the preview panel, never above the frontend.
pub const DEFAULT_PREVIEW_COMMAND: &str = "mpv --loop=inf --no-audio --really-quiet --no-border \
     --no-osc --ontop=no --no-input-default-bindings --input-vo-keyboard=no \
     --geometry={GEOMETRY} --video-aspect-override={CROP} {VIDEO}";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    pub language: String,
    pub up_key: String,
    pub down_key: String,
    pub left_key: String,
    pub right_key: String,
    pub enter_key: String,
    pub back_key: String,
    pub exit_key: String,
    pub game_library_path: String,
    pub preserve_last_selected_game_on_exit: bool,
    pub last_selected_game: String,
    pub default_selected_game: String,
    pub allow_inactivity_mode: bool,
    pub seconds_before_random_game_selection_inactivity_mode: u64,
    pub allow_screen_sleep: bool,
    pub seconds_before_shutdown_screen: u64,
    pub preview_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            up_key: "Up".to_string(),
            down_key: "Down".to_string(),
            left_key: "Left".to_string(),
            right_key: "Right".to_string(),
            enter_key: "LeftCtrl".to_string(),
            back_key: "LeftAlt".to_string(),
            exit_key: "Escape".to_string(),
            game_library_path: "GameLibrary".to_string(),
            preserve_last_selected_game_on_exit: false,
            last_selected_game: String::new(),
            default_selected_game: String::new(),
            allow_inactivity_mode: false,
            seconds_before_random_game_selection_inactivity_mode: 60,
            allow_screen_sleep: false,
            seconds_before_shutdown_screen: 600,
            preview_command: DEFAULT_PREVIEW_COMMAND.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing or unparsable file yields defaults;
    /// fields absent from the file keep their default values.
    pub fn load(path: &Path) -> Settings {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read settings at {}: {}", path.display(), e);
                }
                return Settings::default();
            }
        };
        match serde_json::from_str::<Settings>(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Failed to parse settings at {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Overwrite the settings file with the current values.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        write_replacing(path, json.as_bytes())
    }

    pub fn library_dir(&self) -> PathBuf {
        PathBuf::from(&self.game_library_path)
    }

    /// Name of the game to highlight at startup.
    pub fn startup_game(&self) -> &str {
        if self.preserve_last_selected_game_on_exit {
            &self.last_selected_game
        } else {
            &self.default_selected_game
        }
    }
}

/// Write through a sibling tmp file and rename over the target.
pub(crate) fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join(SETTINGS_FILE));
        assert_eq!(s.up_key, "Up");
        assert_eq!(s.game_library_path, "GameLibrary");
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ \"UpKey\": ").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "UpKey": "W", "AllowScreenSleep": true }"#).unwrap();
        let s = Settings::load(&path);
        assert_eq!(s.up_key, "W");
        assert!(s.allow_screen_sleep);
        assert_eq!(s.down_key, "Down");
        assert_eq!(s.seconds_before_shutdown_screen, 600);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let mut s = Settings::default();
        s.last_selected_game = "Mario".to_string();
        s.allow_inactivity_mode = true;
        s.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"LastSelectedGame\": \"Mario\""));
        assert_eq!(Settings::load(&path), s);
    }

    #[test]
    fn startup_game_follows_preserve_flag() {
        let mut s = Settings::default();
        s.last_selected_game = "Last".to_string();
        s.default_selected_game = "Default".to_string();
        assert_eq!(s.startup_game(), "Default");
        s.preserve_last_selected_game_on_exit = true;
        assert_eq!(s.startup_game(), "Last");
    }
}
