use anyhow::{anyhow, Context, Result};
use sdl2::controller::{Button as CButton, GameController};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use arcade_frontend::settings::SETTINGS_FILE;
use arcade_frontend::ui::{self, Fonts, UIColors};
use arcade_frontend::{style, AppContext, Frontend, PadButton, Platform, RawInput};

const AXIS_THRESHOLD: u16 = 16000;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

/// Binding name used in the settings file for an SDL keycode.
fn key_name(key: Keycode) -> String {
    match key {
        Keycode::LCtrl => "LeftCtrl".to_string(),
        Keycode::RCtrl => "RightCtrl".to_string(),
        Keycode::LAlt => "LeftAlt".to_string(),
        Keycode::RAlt => "RightAlt".to_string(),
        Keycode::LShift => "LeftShift".to_string(),
        Keycode::RShift => "RightShift".to_string(),
        Keycode::Return | Keycode::KpEnter => "Enter".to_string(),
        Keycode::Num0 => "D0".to_string(),
        Keycode::Num1 => "D1".to_string(),
        Keycode::Num2 => "D2".to_string(),
        Keycode::Num3 => "D3".to_string(),
        Keycode::Num4 => "D4".to_string(),
        Keycode::Num5 => "D5".to_string(),
        Keycode::Num6 => "D6".to_string(),
        Keycode::Num7 => "D7".to_string(),
        Keycode::Num8 => "D8".to_string(),
        Keycode::Num9 => "D9".to_string(),
        other => other.name().replace(' ', ""),
    }
}

fn pad_button(button: CButton) -> PadButton {
    match button {
        CButton::DPadUp => PadButton::DPadUp,
        CButton::DPadDown => PadButton::DPadDown,
        CButton::DPadLeft => PadButton::DPadLeft,
        CButton::DPadRight => PadButton::DPadRight,
        CButton::A => PadButton::South,
        CButton::B => PadButton::East,
        CButton::X => PadButton::West,
        CButton::Y => PadButton::North,
        CButton::Start => PadButton::Start,
        CButton::Back => PadButton::Back,
        CButton::LeftStick => PadButton::LeftStick,
        CButton::RightStick => PadButton::RightStick,
        CButton::LeftShoulder => PadButton::LeftShoulder,
        CButton::RightShoulder => PadButton::RightShoulder,
        _ => PadButton::Other,
    }
}

fn find_font(configured: Option<&str>) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| env::var("FONT_PATH").ok())
        .or_else(|| {
            FONT_CANDIDATES
                .iter()
                .find(|p| Path::new(p).exists())
                .map(|s| s.to_string())
        })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("arcade_frontend=info")),
        )
        .init();

    let settings_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
    let ctx = AppContext::load(&settings_path);
    if ctx.library.systems.is_empty() {
        tracing::warn!(
            "No systems found in {}, check GameLibraryPath in {}",
            ctx.settings.library_dir().display(),
            settings_path.display()
        );
    }
    let theme = style::load_style();
    let colors = UIColors::from_theme(&theme);

    let sdl_ctx = sdl2::init().map_err(|e| anyhow!(e))?;
    let video = sdl_ctx.video().map_err(|e| anyhow!(e))?;
    let controller_subsystem = sdl_ctx.game_controller().map_err(|e| anyhow!(e))?;

    let display_mode = video.desktop_display_mode(0).map_err(|e| anyhow!(e))?;
    let (w, h) = (display_mode.w, display_mode.h);
    let platform = Platform::system(&ctx.settings, (w, h));
    let window = video
        .window("Arcade Frontend", w as u32, h as u32)
        .position_centered()
        .fullscreen()
        .build()
        .context("failed to create window")?;
    let mut canvas = window
        .into_canvas()
        .accelerated()
        .present_vsync()
        .build()
        .context("failed to create renderer")?;
    sdl_ctx.mouse().show_cursor(false);
    let texture_creator = canvas.texture_creator();

    let ttf_ctx = sdl2::ttf::init().map_err(|e| anyhow!(e.to_string()))?;
    let font_path = find_font(theme.font_path.as_deref()).ok_or_else(|| {
        anyhow!("No TTF font found. Set font_path in style.toml, set FONT_PATH or install DejaVu/FreeSans.")
    })?;
    let fonts = Fonts {
        title: ttf_ctx
            .load_font(&font_path, theme.font_size + 12)
            .map_err(|e| anyhow!(e))?,
        body: ttf_ctx
            .load_font(&font_path, theme.font_size)
            .map_err(|e| anyhow!(e))?,
    };

    // opened controllers must stay alive to keep delivering events
    let mut controllers: Vec<GameController> = Vec::new();
    let num_joysticks = sdl_ctx
        .joystick()
        .and_then(|j| j.num_joysticks())
        .map_err(|e| anyhow!(e))?;
    for id in 0..num_joysticks {
        if controller_subsystem.is_game_controller(id) {
            match controller_subsystem.open(id) {
                Ok(gc) => {
                    tracing::info!("Opened controller: {}", gc.name());
                    controllers.push(gc);
                }
                Err(e) => tracing::warn!("Failed opening controller {}: {}", id, e),
            }
        }
    }

    let mut event_pump = sdl_ctx.event_pump().map_err(|e| anyhow!(e))?;
    let mut frontend = Frontend::new(ctx, platform, Instant::now());

    'running: loop {
        let now = Instant::now();
        for event in event_pump.poll_iter() {
            let input = match event {
                Event::Quit { .. } => break 'running,
                Event::KeyDown {
                    keycode: Some(k),
                    repeat: false,
                    ..
                } => RawInput::Key(key_name(k)),
                Event::ControllerButtonDown { button, .. } => RawInput::PadDown(pad_button(button)),
                Event::ControllerButtonUp { button, .. } => RawInput::PadUp(pad_button(button)),
                Event::ControllerAxisMotion { value, .. } if value.unsigned_abs() > AXIS_THRESHOLD => {
                    RawInput::Motion
                }
                Event::MouseMotion { .. } => RawInput::Motion,
                Event::ControllerDeviceAdded { which, .. } => {
                    match controller_subsystem.open(which) {
                        Ok(gc) => {
                            tracing::info!("Controller connected: {}", gc.name());
                            controllers.push(gc);
                        }
                        Err(e) => tracing::warn!("Failed opening controller {}: {}", which, e),
                    }
                    continue;
                }
                _ => continue,
            };
            frontend.handle_input(&input, now);
        }

        frontend.tick(now);
        if frontend.should_quit() {
            break;
        }

        let view = frontend.view(now);
        ui::render_view(&mut canvas, &texture_creator, &fonts, &colors, &view, w, h);
        canvas.present();
    }

    tracing::info!("Shutting down");
    Ok(())
}
