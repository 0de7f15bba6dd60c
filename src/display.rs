//! Text and fade values shown by the view.

use std::time::{Duration, Instant};

/// Length of the full-screen fade to and from black.
pub const FADE_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    French,
}

impl Language {
    pub fn from_setting(value: &str) -> Language {
        match value.to_lowercase().as_str() {
            "français" | "francais" | "french" => Language::French,
            _ => Language::English,
        }
    }
}

/// Labels the view needs, per language.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub never: &'static str,
    pub hours: &'static str,
    pub minutes: &'static str,
    pub title: &'static str,
    pub total: &'static str,
    pub loading: &'static str,
    pub confirm_exit: &'static str,
}

pub fn labels(lang: Language) -> Labels {
    match lang {
        Language::English => Labels {
            never: "Never",
            hours: "hours",
            minutes: "minutes",
            title: "Title",
            total: "Total",
            loading: "Loading...",
            confirm_exit: "Quit the arcade?",
        },
        Language::French => Labels {
            never: "Jamais",
            hours: "heures",
            minutes: "minutes",
            title: "Titre",
            total: "Total",
            loading: "Chargement...",
            confirm_exit: "Quitter l'arcade ?",
        },
    }
}

/// "Never", "12 minutes" or "3 hours 5 minutes".
pub fn played_time_text(seconds: f64, lang: Language) -> String {
    let l = labels(lang);
    if seconds <= 0.0 {
        return l.never.to_string();
    }
    let total_minutes = (seconds / 60.0).round() as u64;
    let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
    if hours >= 1 {
        format!("{} {} {} {}", hours, l.hours, minutes, l.minutes)
    } else {
        format!("{} {}", minutes, l.minutes)
    }
}

/// "Title 2 / 5  -  Total 40". Positions are zero-based.
pub fn title_counter_text(position: usize, category_len: usize, total: usize, lang: Language) -> String {
    let l = labels(lang);
    let shown = if category_len == 0 { 0 } else { position + 1 };
    format!("{} {} / {}  -  {} {}", l.title, shown, category_len, l.total, total)
}

pub fn genres_text(genres: &[String]) -> String {
    genres.join(", ")
}

/// Longest prefix of `text` that fits `max_w`, with "..." appended when cut.
pub fn fit_to_width(text: &str, max_w: u32, width_of: impl Fn(&str) -> u32) -> String {
    if width_of(text) <= max_w {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let (mut lo, mut hi) = (0usize, chars.len());
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        let cand: String = chars.iter().take(mid).collect::<String>() + "...";
        if width_of(&cand) <= max_w {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    chars.iter().take(lo).collect::<String>() + "..."
}

/// Greedy word wrap into at most `max_lines` lines; the last line is elided.
pub fn wrap_to_width(
    text: &str,
    max_w: u32,
    max_lines: usize,
    width_of: impl Fn(&str) -> u32,
) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut words = text.split_whitespace();
    while let Some(word) = words.next() {
        let cand = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if width_of(&cand) <= max_w || current.is_empty() {
            current = cand;
            continue;
        }
        if lines.len() + 1 == max_lines {
            let rest: Vec<&str> = std::iter::once(word).chain(words).collect();
            let joined = format!("{} {}", current, rest.join(" "));
            lines.push(fit_to_width(&joined, max_w, &width_of));
            return lines;
        }
        lines.push(std::mem::replace(&mut current, word.to_string()));
    }
    if !current.is_empty() && lines.len() < max_lines {
        lines.push(fit_to_width(&current, max_w, &width_of));
    }
    lines
}

/// Opacity of the black fade overlay ramping from `from` to `to`.
pub fn fade_opacity(from: f32, to: f32, until: Instant, now: Instant) -> f32 {
    let remaining = until.saturating_duration_since(now).as_secs_f32();
    let ratio = 1.0 - (remaining / FADE_DURATION.as_secs_f32()).min(1.0);
    from + (to - from) * ratio
}

/// Full-screen black overlay driven by the idle sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fade {
    #[default]
    Clear,
    Out { until: Instant },
    In { until: Instant },
}

impl Fade {
    pub fn out(now: Instant) -> Fade {
        Fade::Out {
            until: now + FADE_DURATION,
        }
    }

    pub fn fade_in(now: Instant) -> Fade {
        Fade::In {
            until: now + FADE_DURATION,
        }
    }

    pub fn opacity(self, now: Instant) -> f32 {
        match self {
            Fade::Clear => 0.0,
            Fade::Out { until } => fade_opacity(0.0, 1.0, until, now),
            Fade::In { until } => fade_opacity(1.0, 0.0, until, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn played_time_formats() {
        assert_eq!(played_time_text(0.0, Language::English), "Never");
        assert_eq!(played_time_text(29.0, Language::English), "0 minutes");
        assert_eq!(played_time_text(12.0 * 60.0 + 20.0, Language::English), "12 minutes");
        assert_eq!(played_time_text(3.0 * 3600.0 + 5.0 * 60.0, Language::English), "3 hours 5 minutes");
        assert_eq!(played_time_text(96.0 * 60.0, Language::French), "1 heures 36 minutes");
        // 119.75 minutes rounds up into the next hour
        assert_eq!(played_time_text(119.75 * 60.0, Language::English), "2 hours 0 minutes");
        assert_eq!(played_time_text(59.75 * 60.0, Language::English), "1 hours 0 minutes");
    }

    #[test]
    fn language_from_settings() {
        assert_eq!(Language::from_setting("English"), Language::English);
        assert_eq!(Language::from_setting("français"), Language::French);
        assert_eq!(Language::from_setting("Klingon"), Language::English);
    }

    #[test]
    fn title_counter() {
        assert_eq!(title_counter_text(1, 5, 40, Language::English), "Title 2 / 5  -  Total 40");
        assert_eq!(title_counter_text(0, 0, 3, Language::English), "Title 0 / 0  -  Total 3");
    }

    #[test]
    fn fade_ramps_linearly() {
        let now = Instant::now();
        let until = now + FADE_DURATION;
        assert_eq!(fade_opacity(0.0, 1.0, until, now), 0.0);
        let mid = fade_opacity(0.0, 1.0, until, now + FADE_DURATION / 2);
        assert!((mid - 0.5).abs() < 1e-3);
        assert_eq!(fade_opacity(1.0, 0.0, until, until), 0.0);
    }

    fn chars(s: &str) -> u32 {
        s.chars().count() as u32
    }

    #[test]
    fn fit_elides_long_text() {
        assert_eq!(fit_to_width("Tetris", 10, chars), "Tetris");
        assert_eq!(fit_to_width("The Legend of Zelda", 10, chars), "The Leg...");
        assert_eq!(fit_to_width("Zelda", 2, chars), "...");
    }

    #[test]
    fn wrap_breaks_on_words_and_caps_lines() {
        let text = "a quick brown fox jumps over the lazy dog";
        assert_eq!(wrap_to_width(text, 11, 10, chars), ["a quick", "brown fox", "jumps over", "the lazy", "dog"]);
        assert_eq!(wrap_to_width(text, 11, 2, chars), ["a quick", "brown fo..."]);
        assert!(wrap_to_width("", 11, 2, chars).is_empty());
    }

    #[test]
    fn fade_out_holds_black() {
        let now = Instant::now();
        let fade = Fade::out(now);
        assert_eq!(fade.opacity(now + FADE_DURATION * 3), 1.0);
        assert_eq!(Fade::default().opacity(now), 0.0);
    }
}
