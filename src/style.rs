use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Renderer colours and sizes after merging the user's style file.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub background: [u8; 3],
    pub panel: [u8; 3],
    pub panel_selected: [u8; 3],
    pub text_primary: [u8; 3],
    pub text_secondary: [u8; 3],
    pub accent: [u8; 3],
    pub popup_bg: [u8; 3],
    pub popup_text: [u8; 3],
    pub popup_alpha: u8,
    pub font_size: u16,
    pub font_path: Option<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: [12, 12, 12],
            panel: [40, 40, 40],
            panel_selected: [200, 180, 50],
            text_primary: [240, 240, 240],
            text_secondary: [180, 180, 180],
            accent: [200, 180, 50],
            popup_bg: [0, 0, 0],
            popup_alpha: 200,
            popup_text: [230, 230, 230],
            font_size: 22,
            font_path: None,
        }
    }
}

/// On-disk form: every field optional, missing ones keep the default.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StyleFile {
    pub background: Option<[u8; 3]>,
    pub panel: Option<[u8; 3]>,
    pub panel_selected: Option<[u8; 3]>,
    pub text_primary: Option<[u8; 3]>,
    pub text_secondary: Option<[u8; 3]>,
    pub accent: Option<[u8; 3]>,
    pub popup_bg: Option<[u8; 3]>,
    pub popup_text: Option<[u8; 3]>,
    pub popup_alpha: Option<u8>,
    pub font_size: Option<u16>,
    pub font_path: Option<String>,
}

const SAMPLE_STYLE: &str = r#"# Arcade frontend colours, as [r, g, b].
# Delete a line to fall back to the built-in value.
background = [12, 12, 12]
panel = [40, 40, 40]
panel_selected = [200, 180, 50]
text_primary = [240, 240, 240]
text_secondary = [180, 180, 180]
accent = [200, 180, 50]
popup_bg = [0, 0, 0]
popup_text = [230, 230, 230]
popup_alpha = 200
font_size = 22
# font_path = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
"#;

impl Theme {
    fn merge(&mut self, file: StyleFile) {
        if let Some(c) = file.background {
            self.background = c;
        }
        if let Some(c) = file.panel {
            self.panel = c;
        }
        if let Some(c) = file.panel_selected {
            self.panel_selected = c;
        }
        if let Some(c) = file.text_primary {
            self.text_primary = c;
        }
        if let Some(c) = file.text_secondary {
            self.text_secondary = c;
        }
        if let Some(c) = file.accent {
            self.accent = c;
        }
        if let Some(c) = file.popup_bg {
            self.popup_bg = c;
        }
        if let Some(c) = file.popup_text {
            self.popup_text = c;
        }
        if let Some(a) = file.popup_alpha {
            self.popup_alpha = a;
        }
        if let Some(size) = file.font_size {
            self.font_size = size;
        }
        if file.font_path.is_some() {
            self.font_path = file.font_path;
        }
    }
}

pub fn user_style_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(xdg) => PathBuf::from(xdg),
        None => dirs::home_dir()?.join(".config"),
    };
    Some(base.join("arcade_frontend").join("style.toml"))
}

fn write_sample_style(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, SAMPLE_STYLE.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load the theme from `path`, writing the sample there first if absent.
/// Unreadable or invalid files leave the defaults in place.
pub fn load_style_from(path: &Path) -> Theme {
    let mut theme = Theme::default();
    if !path.exists() {
        if let Err(e) = write_sample_style(path) {
            tracing::warn!("Failed to write sample style to {}: {}", path.display(), e);
            return theme;
        }
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<StyleFile>(&contents) {
            Ok(parsed) => theme.merge(parsed),
            Err(e) => tracing::warn!("Failed to parse style at {}: {}", path.display(), e),
        },
        Err(e) => tracing::warn!("Failed to read style at {}: {}", path.display(), e),
    }
    theme
}

pub fn load_style() -> Theme {
    match user_style_path() {
        Some(p) => load_style_from(&p),
        None => Theme::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_written_and_matches_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arcade_frontend").join("style.toml");
        let theme = load_style_from(&path);
        assert!(path.exists());
        assert_eq!(theme, Theme::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.toml");
        std::fs::write(&path, "background = [1, 2, 3]\nfont_size = 30\n").unwrap();
        let theme = load_style_from(&path);
        assert_eq!(theme.background, [1, 2, 3]);
        assert_eq!(theme.font_size, 30);
        assert_eq!(theme.panel, Theme::default().panel);
    }

    #[test]
    fn invalid_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.toml");
        std::fs::write(&path, "background = \"red\"").unwrap();
        assert_eq!(load_style_from(&path), Theme::default());
    }
}
