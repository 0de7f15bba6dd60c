//! Arcade cabinet frontend: a two-axis game carousel that launches and
//! supervises emulator processes.
//!
//! Everything here is toolkit-independent and driven by explicit `Instant`s;
//! the SDL2 kiosk window lives behind the `sdl` feature.

pub mod display;
pub mod frontend;
pub mod idle;
pub mod input;
pub mod launch;
pub mod library;
pub mod navigation;
pub mod preview;
pub mod process;
pub mod settings;
pub mod style;
#[cfg(feature = "sdl")]
pub mod ui;

use thiserror::Error;

pub use frontend::{AppContext, Frontend, FrontendView, Platform};
pub use input::{Action, PadButton, RawInput};
pub use library::{Game, Library, System};
pub use settings::Settings;

/// Errors from the JSON-backed settings and library stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
