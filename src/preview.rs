//! Background video preview of the highlighted game.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::library::{Game, Library};

/// Delay between the last game change and the preview restarting.
pub const PREVIEW_SETTLE: Duration = Duration::from_secs(1);

pub const VIDEO_TOKEN: &str = "{VIDEO}";
pub const CROP_TOKEN: &str = "{CROP}";
pub const GEOMETRY_TOKEN: &str = "{GEOMETRY}";

/// How long after a player starts before the frontend takes focus back.
pub const PREVIEW_REFOCUS: Duration = Duration::from_millis(500);

const PANEL_PADDING: i32 = 24;

const WIDESCREEN: &str = "16:9";

/// Margins (left, top, right, bottom) of the preview area in the view, in
/// pixels at the reference resolution, and the crop geometry for the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLayout {
    pub margins: (i32, i32, i32, i32),
    pub crop: String,
}

impl VideoLayout {
    pub fn for_aspect(aspect_ratio: &str) -> VideoLayout {
        let aspect = aspect_ratio.trim();
        let margins = if aspect == WIDESCREEN {
            (40, 56, 0, 55)
        } else {
            (87, 0, 87, 0)
        };
        VideoLayout {
            margins,
            crop: if aspect.is_empty() {
                WIDESCREEN.to_string()
            } else {
                aspect.to_string()
            },
        }
    }
}

/// A screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

impl Area {
    /// The panel reserved for previews: right of the game column, lower half.
    pub fn preview_panel(screen_w: i32, screen_h: i32) -> Area {
        let x = screen_w / 3 + PANEL_PADDING;
        let y = screen_h / 2;
        Area {
            x,
            y,
            w: (screen_w - x - PANEL_PADDING).max(1) as u32,
            h: (screen_h - y - PANEL_PADDING * 3).max(1) as u32,
        }
    }

    pub fn inset(self, (left, top, right, bottom): (i32, i32, i32, i32)) -> Area {
        Area {
            x: self.x + left,
            y: self.y + top,
            w: (self.w as i32 - left - right).max(1) as u32,
            h: (self.h as i32 - top - bottom).max(1) as u32,
        }
    }

    /// X11 geometry string, `WxH+X+Y`.
    pub fn geometry(&self) -> String {
        format!("{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewClip {
    pub video: PathBuf,
    pub layout: VideoLayout,
}

impl PreviewClip {
    /// The game's clip, or None when the game has no video.
    pub fn for_game(game: &Game, library: &Library) -> Option<PreviewClip> {
        Some(PreviewClip {
            video: library.asset_path(&game.game_video)?,
            layout: VideoLayout::for_aspect(&game.game_video_aspect_ratio),
        })
    }
}

pub trait PreviewPlayer {
    /// Replace whatever is playing with `clip`, looping.
    fn play(&mut self, clip: &PreviewClip);
    fn stop(&mut self);
}

/// Runs an external player per clip from a command template, placed over
/// the preview panel of a `screen` sized window.
pub struct CommandPreviewPlayer {
    template: Vec<String>,
    screen: (i32, i32),
    child: Option<Child>,
}

impl CommandPreviewPlayer {
    /// Returns None for an empty or unparsable template, which disables previews.
    pub fn new(template: &str, screen: (i32, i32)) -> Option<Self> {
        match shell_words::split(template) {
            Ok(words) if !words.is_empty() => Some(CommandPreviewPlayer {
                template: words,
                screen,
                child: None,
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Invalid preview command {:?}: {}", template, e);
                None
            }
        }
    }

    fn command_line(&self, clip: &PreviewClip) -> Vec<String> {
        let video = clip.video.to_string_lossy();
        let (w, h) = self.screen;
        let geometry = Area::preview_panel(w, h).inset(clip.layout.margins).geometry();
        self.template
            .iter()
            .map(|word| {
                word.replace(VIDEO_TOKEN, &video)
                    .replace(CROP_TOKEN, &clip.layout.crop)
                    .replace(GEOMETRY_TOKEN, &geometry)
            })
            .collect()
    }
}

impl PreviewPlayer for CommandPreviewPlayer {
    fn play(&mut self, clip: &PreviewClip) {
        self.stop();
        if !clip.video.exists() {
            tracing::debug!("No preview video at {}", clip.video.display());
            return;
        }
        let line = self.command_line(clip);
        let Some((program, args)) = line.split_first() else {
            return;
        };
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.child = Some(child),
            Err(e) => tracing::warn!("Failed to start preview player {}: {}", program, e),
        }
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for CommandPreviewPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Default)]
pub struct NoPreview;

impl PreviewPlayer for NoPreview {
    fn play(&mut self, _clip: &PreviewClip) {}
    fn stop(&mut self) {}
}

/// Debounced restart: every reschedule pushes the start back by a full settle.
#[derive(Debug, Default)]
pub struct PreviewSchedule {
    due: Option<Instant>,
}

impl PreviewSchedule {
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.due = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn due(&self) -> Option<Instant> {
        self.due
    }

    /// True once when the restart is due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(t) if now >= t => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    pub enum PlayerCall {
        Play(PathBuf),
        Stop,
    }

    #[derive(Debug, Clone, Default)]
    pub struct RecordingPlayer {
        calls: Rc<RefCell<Vec<PlayerCall>>>,
    }

    impl RecordingPlayer {
        pub fn calls(&self) -> Vec<PlayerCall> {
            self.calls.borrow().clone()
        }

        pub fn plays(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| matches!(c, PlayerCall::Play(_)))
                .count()
        }

        pub fn clear(&self) {
            self.calls.borrow_mut().clear();
        }
    }

    impl PreviewPlayer for RecordingPlayer {
        fn play(&mut self, clip: &PreviewClip) {
            self.calls.borrow_mut().push(PlayerCall::Play(clip.video.clone()));
        }

        fn stop(&mut self) {
            self.calls.borrow_mut().push(PlayerCall::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::game;

    #[test]
    fn layout_by_aspect_ratio() {
        assert_eq!(VideoLayout::for_aspect("16:9").margins, (40, 56, 0, 55));
        assert_eq!(VideoLayout::for_aspect("4:3").margins, (87, 0, 87, 0));
        assert_eq!(VideoLayout::for_aspect("4:3").crop, "4:3");
        assert_eq!(VideoLayout::for_aspect("").crop, "16:9");
    }

    #[test]
    fn clip_paths_resolve_against_library() {
        let lib = Library::new("/lib", vec![], vec![]);
        let mut g = game("Mario", "nes");
        assert_eq!(PreviewClip::for_game(&g, &lib), None);
        g.game_video = "videos/mario.mp4".to_string();
        let clip = PreviewClip::for_game(&g, &lib).unwrap();
        assert_eq!(clip.video, std::path::Path::new("/lib/videos/mario.mp4"));
        g.game_video = "/media/mario.mp4".to_string();
        let clip = PreviewClip::for_game(&g, &lib).unwrap();
        assert_eq!(clip.video, std::path::Path::new("/media/mario.mp4"));
    }

    #[test]
    fn command_template_substitutes_tokens() {
        let player = CommandPreviewPlayer::new(
            "mpv --no-border --geometry={GEOMETRY} --video-aspect-override={CROP} {VIDEO}",
            (1920, 1080),
        )
        .unwrap();
        let clip = PreviewClip {
            video: PathBuf::from("/lib/my clip.mp4"),
            layout: VideoLayout::for_aspect("4:3"),
        };
        // panel at (664, 540) sized 1232x468, narrowed by the 4:3 side margins
        assert_eq!(
            player.command_line(&clip),
            [
                "mpv",
                "--no-border",
                "--geometry=1058x468+751+540",
                "--video-aspect-override=4:3",
                "/lib/my clip.mp4"
            ]
        );
        assert!(CommandPreviewPlayer::new("  ", (1920, 1080)).is_none());
        assert!(CommandPreviewPlayer::new("mpv 'unterminated", (1920, 1080)).is_none());
    }

    #[test]
    fn default_command_stays_inside_the_panel() {
        let player =
            CommandPreviewPlayer::new(crate::settings::DEFAULT_PREVIEW_COMMAND, (1280, 720)).unwrap();
        let clip = PreviewClip {
            video: PathBuf::from("/lib/sonic.mp4"),
            layout: VideoLayout::for_aspect("16:9"),
        };
        let line = player.command_line(&clip);
        assert!(!line.iter().any(|w| w == "--fs" || w == "--fullscreen"));
        let panel = Area::preview_panel(1280, 720).inset((40, 56, 0, 55));
        assert!(line.contains(&format!("--geometry={}", panel.geometry())));
        assert!(line.contains(&"--video-aspect-override=16:9".to_string()));
        assert_eq!(line.last().map(String::as_str), Some("/lib/sonic.mp4"));
    }

    #[test]
    fn reschedule_debounces() {
        let now = Instant::now();
        let mut s = PreviewSchedule::default();
        s.schedule(now, PREVIEW_SETTLE);
        s.schedule(now + Duration::from_millis(600), PREVIEW_SETTLE);
        assert!(!s.take_due(now + Duration::from_millis(1200)));
        assert!(s.take_due(now + Duration::from_millis(1600)));
        assert!(!s.take_due(now + Duration::from_secs(5)));
    }
}
