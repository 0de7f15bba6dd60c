use sdl2::pixels::Color;
use sdl2::rect::Rect;
use sdl2::render::{BlendMode, TextureCreator, WindowCanvas};
use sdl2::ttf::Font;
use sdl2::video::WindowContext;

use crate::display::{fit_to_width, wrap_to_width};
use crate::frontend::FrontendView;
use crate::navigation::Direction;
use crate::preview::Area;
use crate::style::Theme;

const BANNER_H: i32 = 90;
const PADDING: i32 = 24;
const ROW_H: i32 = 64;
const DESCRIPTION_LINES: usize = 8;

pub struct UIColors {
    pub bg: Color,
    pub panel: Color,
    pub panel_selected: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub accent: Color,
    pub popup_rgba: Color,
    pub popup_text: Color,
}

fn rgb(c: [u8; 3]) -> Color {
    Color::RGB(c[0], c[1], c[2])
}

impl UIColors {
    pub fn from_theme(theme: &Theme) -> Self {
        let [r, g, b] = theme.popup_bg;
        UIColors {
            bg: rgb(theme.background),
            panel: rgb(theme.panel),
            panel_selected: rgb(theme.panel_selected),
            text_primary: rgb(theme.text_primary),
            text_secondary: rgb(theme.text_secondary),
            accent: rgb(theme.accent),
            popup_rgba: Color::RGBA(r, g, b, theme.popup_alpha),
            popup_text: rgb(theme.popup_text),
        }
    }
}

pub struct Fonts<'f> {
    pub title: Font<'f, 'static>,
    pub body: Font<'f, 'static>,
}

/// Draw `text` with its top-left corner at (x, y). Returns the drawn size.
fn draw_text(
    canvas: &mut WindowCanvas,
    texture_creator: &TextureCreator<WindowContext>,
    font: &Font,
    text: &str,
    color: Color,
    x: i32,
    y: i32,
) -> (u32, u32) {
    if text.is_empty() {
        return (0, 0);
    }
    let Ok(surface) = font.render(text).blended(color) else {
        return (0, 0);
    };
    let Ok(tex) = texture_creator.create_texture_from_surface(&surface) else {
        return (0, 0);
    };
    let q = tex.query();
    let _ = canvas.copy(&tex, None, Rect::new(x, y, q.width, q.height));
    (q.width, q.height)
}

fn draw_text_centered(
    canvas: &mut WindowCanvas,
    texture_creator: &TextureCreator<WindowContext>,
    font: &Font,
    text: &str,
    color: Color,
    center_x: i32,
    y: i32,
) {
    let (tw, _) = font.size_of(text).unwrap_or((0, 0));
    draw_text(canvas, texture_creator, font, text, color, center_x - tw as i32 / 2, y);
}

/// Offset of the outgoing content during a carousel slide: starts a full
/// `distance` away and eases to zero.
fn slide_offset(slide: Option<(Direction, f32)>, distance: i32) -> i32 {
    match slide {
        None => 0,
        Some((dir, progress)) => {
            let remaining = (1.0 - progress) * distance as f32;
            match dir {
                Direction::Forward => remaining as i32,
                Direction::Backward => -(remaining as i32),
            }
        }
    }
}

/// Render one frame: system banner, game column, details, then the
/// loading text, the black fade and the exit popup on top.
pub fn render_view(
    canvas: &mut WindowCanvas,
    texture_creator: &TextureCreator<WindowContext>,
    fonts: &Fonts,
    colors: &UIColors,
    view: &FrontendView,
    w: i32,
    h: i32,
) {
    canvas.set_blend_mode(BlendMode::Blend);
    canvas.set_draw_color(colors.bg);
    canvas.clear();

    // system banner
    canvas.set_draw_color(colors.panel);
    let _ = canvas.fill_rect(Rect::new(0, 0, w as u32, BANNER_H as u32));
    let sys_x = w / 2 + slide_offset(view.system_slide, w / 4);
    let quarter = (w / 4) as u32;
    let title_w = |s: &str| fonts.title.size_of(s).map(|(w, _)| w).unwrap_or(0);
    let body_w = |s: &str| fonts.body.size_of(s).map(|(w, _)| w).unwrap_or(0);
    draw_text_centered(
        canvas,
        texture_creator,
        &fonts.title,
        &fit_to_width(&view.system_name, quarter * 2, &title_w),
        colors.text_primary,
        sys_x,
        PADDING,
    );
    if let Some((name, _)) = &view.prev_system {
        let name = fit_to_width(name, quarter, &body_w);
        draw_text_centered(canvas, texture_creator, &fonts.body, &name, colors.text_secondary, sys_x - w / 3, PADDING + 8);
    }
    if let Some((name, _)) = &view.next_system {
        let name = fit_to_width(name, quarter, &body_w);
        draw_text_centered(canvas, texture_creator, &fonts.body, &name, colors.text_secondary, sys_x + w / 3, PADDING + 8);
    }

    // game column: previous, current, next
    let col_w = w / 3 - PADDING * 2;
    let mid_y = h / 2 - ROW_H / 2 + slide_offset(view.game_slide, ROW_H + PADDING);
    let text_max = (col_w - PADDING).max(0) as u32;
    let rows = [
        (view.prev_game.as_ref().map(|(n, _)| n.as_str()), mid_y - ROW_H - PADDING, false),
        (view.game.as_ref().map(|g| g.name.as_str()), mid_y, true),
        (view.next_game.as_ref().map(|(n, _)| n.as_str()), mid_y + ROW_H + PADDING, false),
    ];
    for (name, y, selected) in rows {
        let Some(name) = name else { continue };
        canvas.set_draw_color(if selected { colors.panel_selected } else { colors.panel });
        let _ = canvas.fill_rect(Rect::new(PADDING, y, col_w.max(1) as u32, ROW_H as u32));
        let text = fit_to_width(name, text_max, &body_w);
        let color = if selected { colors.bg } else { colors.text_primary };
        draw_text(canvas, texture_creator, &fonts.body, &text, color, PADDING * 2, y + ROW_H / 3);
    }

    // details
    let detail_x = w / 3 + PADDING;
    let detail_w = (w - detail_x - PADDING).max(0) as u32;
    let mut y = BANNER_H + PADDING;
    if let Some(card) = &view.game {
        let (_, th) = draw_text(canvas, texture_creator, &fonts.title, &fit_to_width(&card.name, detail_w, &title_w), colors.text_primary, detail_x, y);
        y += th as i32 + PADDING / 2;
        for line in [&card.genres, &card.developer, &card.release_year] {
            let (_, lh) = draw_text(canvas, texture_creator, &fonts.body, &fit_to_width(line, detail_w, &body_w), colors.text_secondary, detail_x, y);
            y += lh as i32;
        }
        let (_, lh) = draw_text(canvas, texture_creator, &fonts.body, &card.played_time, colors.accent, detail_x, y);
        y += lh as i32 + PADDING;

        match view.video_margins {
            Some(margins) => {
                // the external player draws inside this frame
                let area = Area::preview_panel(w, h).inset(margins);
                canvas.set_draw_color(colors.panel);
                let _ = canvas.draw_rect(Rect::new(area.x, area.y, area.w, area.h));
            }
            None => {
                for line in wrap_to_width(&card.description, detail_w, DESCRIPTION_LINES, &body_w) {
                    let (_, lh) = draw_text(canvas, texture_creator, &fonts.body, &line, colors.text_primary, detail_x, y);
                    y += lh as i32;
                }
            }
        }
    }
    draw_text(canvas, texture_creator, &fonts.body, &view.title_counter, colors.text_secondary, PADDING, h - PADDING * 2);

    if view.fade > 0.0 {
        let alpha = (view.fade.clamp(0.0, 1.0) * 255.0) as u8;
        canvas.set_draw_color(Color::RGBA(0, 0, 0, alpha));
        let _ = canvas.fill_rect(Rect::new(0, 0, w as u32, h as u32));
    }

    if let Some(loading) = view.loading {
        draw_text_centered(canvas, texture_creator, &fonts.title, loading, colors.text_primary, w / 2, h / 2);
    }

    if let Some(prompt) = view.popup {
        canvas.set_draw_color(colors.popup_rgba);
        let _ = canvas.fill_rect(Rect::new(0, 0, w as u32, h as u32));
        let box_w = (w / 2).max(1);
        let box_h = BANNER_H * 2;
        let box_x = w / 4;
        let box_y = h / 2 - box_h / 2;
        canvas.set_draw_color(colors.panel);
        let _ = canvas.fill_rect(Rect::new(box_x, box_y, box_w as u32, box_h as u32));
        draw_text_centered(canvas, texture_creator, &fonts.title, prompt, colors.popup_text, w / 2, box_y + box_h / 2 - PADDING);
    }
}
