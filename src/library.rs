use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::settings::write_replacing;
use crate::StoreError;

pub const SYSTEMS_FILE: &str = "ArcadeShineSystems.json";
pub const GAMES_FILE: &str = "ArcadeShineGames.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct System {
    pub system_identifier: String,
    pub system_display_name: String,
    pub system_executable: String,
    pub system_executable_arguments: String,
    pub system_logo: String,
    pub system_is_game_launcher: bool,
    pub exit_launcher_on_game_exit: bool,
}

impl Default for System {
    fn default() -> Self {
        Self {
            system_identifier: String::new(),
            system_display_name: String::new(),
            system_executable: String::new(),
            system_executable_arguments: "{GAME_ARGS}".to_string(),
            system_logo: String::new(),
            system_is_game_launcher: false,
            exit_launcher_on_game_exit: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Game {
    pub game_rom_identifier: String,
    pub game_name: String,
    pub game_description: String,
    pub game_system: String,
    pub game_genres: Vec<String>,
    pub game_developer: String,
    pub game_release_year: String,
    pub game_logo: String,
    pub game_background_picture: String,
    pub game_video: String,
    pub game_video_aspect_ratio: String,
    /// Accumulated play time in seconds.
    pub game_played_time: f64,
    pub game_process_args: String,
    pub game_process_name_to_watch: String,
}

/// Ordered system and game lists backed by two JSON files in one directory.
#[derive(Debug, Clone, Default)]
pub struct Library {
    pub systems: Vec<System>,
    pub games: Vec<Game>,
    dir: PathBuf,
}

impl Library {
    pub fn new(dir: impl Into<PathBuf>, systems: Vec<System>, games: Vec<Game>) -> Self {
        let mut lib = Library {
            systems,
            games,
            dir: dir.into(),
        };
        lib.sort();
        lib
    }

    /// Load both lists from `dir`. Missing or malformed files yield empty lists.
    pub fn load(dir: &Path) -> Library {
        let systems = load_list::<System>(&dir.join(SYSTEMS_FILE));
        let games = load_list::<Game>(&dir.join(GAMES_FILE));
        tracing::info!(
            "Loaded {} systems and {} games from {}",
            systems.len(),
            games.len(),
            dir.display()
        );
        Library::new(dir, systems, games)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of a logo, picture or video named in the library.
    /// Relative names resolve against the library directory.
    pub fn asset_path(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let path = Path::new(name);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(self.dir.join(path))
        }
    }

    pub fn save_systems(&self) -> Result<(), StoreError> {
        save_list(&self.dir.join(SYSTEMS_FILE), &self.systems)
    }

    pub fn save_games(&self) -> Result<(), StoreError> {
        save_list(&self.dir.join(GAMES_FILE), &self.games)
    }

    fn sort(&mut self) {
        self.systems
            .sort_by(|a, b| a.system_display_name.cmp(&b.system_display_name));
        self.games.sort_by(|a, b| a.game_name.cmp(&b.game_name));
    }

    /// Indices into `games` of every game owned by the system at `system_index`,
    /// in list order. Out-of-range or empty system lists give an empty category.
    pub fn category(&self, system_index: usize) -> Vec<usize> {
        let Some(system) = self.systems.get(system_index) else {
            return Vec::new();
        };
        self.games
            .iter()
            .enumerate()
            .filter(|(_, g)| g.game_system == system.system_identifier)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn system_index_of(&self, identifier: &str) -> Option<usize> {
        self.systems
            .iter()
            .position(|s| s.system_identifier == identifier)
    }

    pub fn game_index_by_name(&self, name: &str) -> Option<usize> {
        self.games.iter().position(|g| g.game_name == name)
    }

    /// Owning system of the game at `game_index`, if it resolves.
    pub fn system_of(&self, game_index: usize) -> Option<usize> {
        let game = self.games.get(game_index)?;
        self.system_index_of(&game.game_system)
    }
}

fn load_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
            }
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<T>>(&contents) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn save_list<T: Serialize>(path: &Path, list: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(list)?;
    write_replacing(path, json.as_bytes())
}


#[cfg(test)]
mod tests {
    use super::fixtures::{game, system};
    use super::*;

    #[test]
    fn load_sorts_and_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = Library::load(dir.path());
        assert!(empty.systems.is_empty());
        assert!(empty.games.is_empty());

        let lib = Library::new(
            dir.path(),
            vec![system("snes", "Super Nintendo"), system("nes", "NES")],
            vec![game("Zelda", "nes"), game("Contra", "nes"), game("F-Zero", "snes")],
        );
        lib.save_systems().unwrap();
        lib.save_games().unwrap();

        let reloaded = Library::load(dir.path());
        let names: Vec<_> = reloaded
            .systems
            .iter()
            .map(|s| s.system_display_name.as_str())
            .collect();
        assert_eq!(names, ["NES", "Super Nintendo"]);
        let games: Vec<_> = reloaded.games.iter().map(|g| g.game_name.as_str()).collect();
        assert_eq!(games, ["Contra", "F-Zero", "Zelda"]);
    }

    #[test]
    fn loads_library_written_by_the_manager() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ArcadeShineSystems.json"),
            r#"[{"SystemIdentifier":"nes","SystemDisplayName":"NES","SystemExecutable":"/usr/bin/nestopia"}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("ArcadeShineGames.json"),
            r#"[{"GameRomIdentifier":"mario","GameName":"Super Mario Bros.","GameSystem":"nes","GamePlayedTime":90.5}]"#,
        )
        .unwrap();

        let lib = Library::load(dir.path());
        assert_eq!(lib.systems.len(), 1);
        assert_eq!(lib.systems[0].system_executable, "/usr/bin/nestopia");
        assert_eq!(lib.games.len(), 1);
        assert_eq!(lib.games[0].game_name, "Super Mario Bros.");
        assert_eq!(lib.games[0].game_played_time, 90.5);
    }

    #[test]
    fn malformed_games_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GAMES_FILE), "[{").unwrap();
        assert!(Library::load(dir.path()).games.is_empty());
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let lib_dir = dir.path().join("GameLibrary");
        let lib = Library::new(&lib_dir, vec![], vec![game("Mario", "nes")]);
        lib.save_games().unwrap();
        assert!(lib_dir.join(GAMES_FILE).exists());
    }

    #[test]
    fn category_is_filtered_subsequence() {
        let lib = Library::new(
            "unused",
            vec![system("nes", "NES"), system("gb", "Game Boy")],
            vec![
                game("Tetris", "gb"),
                game("Mario", "nes"),
                game("Kirby", "gb"),
                game("Orphan", "missing"),
            ],
        );
        // sorted systems: Game Boy, NES
        let gb: Vec<_> = lib
            .category(0)
            .into_iter()
            .map(|i| lib.games[i].game_name.clone())
            .collect();
        assert_eq!(gb, ["Kirby", "Tetris"]);
        assert_eq!(lib.category(1).len(), 1);
        assert!(lib.category(5).is_empty());
        assert_eq!(lib.system_of(lib.game_index_by_name("Orphan").unwrap()), None);
    }

    #[test]
    fn reads_pascal_case_fields() {
        let raw = r#"[{"GameName":"Mario","GameSystem":"nes","GamePlayedTime":12.5,"GameGenres":["Platform"]}]"#;
        let games: Vec<Game> = serde_json::from_str(raw).unwrap();
        assert_eq!(games[0].game_name, "Mario");
        assert_eq!(games[0].game_played_time, 12.5);
        assert_eq!(games[0].game_genres, ["Platform"]);
        assert!(games[0].game_video.is_empty());
    }
}
