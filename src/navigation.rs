use std::time::{Duration, Instant};

use crate::library::{Game, Library, System};

/// Length of a system or game carousel transition.
pub const CAROUSEL_TRANSITION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Transition state of one carousel axis. A busy axis drops new requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Animation {
    Idle,
    Animating {
        direction: Direction,
        started: Instant,
        until: Instant,
    },
}

impl Animation {
    fn start(direction: Direction, now: Instant) -> Animation {
        Animation::Animating {
            direction,
            started: now,
            until: now + CAROUSEL_TRANSITION,
        }
    }

    pub fn is_busy(&self, now: Instant) -> bool {
        matches!(self, Animation::Animating { until, .. } if now < *until)
    }

    /// Direction and completion ratio in `0.0..=1.0` while animating.
    pub fn progress(&self, now: Instant) -> Option<(Direction, f32)> {
        match *self {
            Animation::Idle => None,
            Animation::Animating {
                direction,
                started,
                until,
            } => {
                let total = (until - started).as_secs_f32();
                let done = now.saturating_duration_since(started).as_secs_f32();
                let ratio = if total > 0.0 { (done / total).min(1.0) } else { 1.0 };
                Some((direction, ratio))
            }
        }
    }
}

/// Which axis finished its transition during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    System,
    Game,
}

pub fn wrap_next(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        (index + 1) % len
    }
}

pub fn wrap_prev(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if index == 0 {
        len - 1
    } else {
        index - 1
    }
}

/// Current position in the system x game carousel.
#[derive(Debug, Clone)]
pub struct Navigation {
    system_index: usize,
    game_index: usize,
    /// indices into `Library::games` owned by the current system
    category: Vec<usize>,
    system_anim: Animation,
    game_anim: Animation,
}

impl Navigation {
    pub fn new(library: &Library) -> Self {
        Navigation {
            system_index: 0,
            game_index: 0,
            category: library.category(0),
            system_anim: Animation::Idle,
            game_anim: Animation::Idle,
        }
    }

    pub fn system_index(&self) -> usize {
        self.system_index
    }

    pub fn game_index(&self) -> usize {
        self.game_index
    }

    pub fn category(&self) -> &[usize] {
        &self.category
    }

    pub fn system_animation(&self) -> Animation {
        self.system_anim
    }

    pub fn game_animation(&self) -> Animation {
        self.game_anim
    }

    /// Recompute the category for the current system and reset the game index.
    pub fn refresh_category(&mut self, library: &Library) {
        if library.systems.is_empty() {
            self.system_index = 0;
        } else if self.system_index >= library.systems.len() {
            self.system_index = library.systems.len() - 1;
        }
        self.category = library.category(self.system_index);
        self.game_index = 0;
    }

    /// Jump to the game at `game` (index into the full list). Returns false and
    /// leaves the position untouched if its system does not resolve.
    pub fn select_game(&mut self, library: &Library, game: usize) -> bool {
        let Some(system) = library.system_of(game) else {
            return false;
        };
        self.system_index = system;
        self.refresh_category(library);
        self.game_index = self
            .category
            .iter()
            .position(|&g| g == game)
            .unwrap_or(0);
        true
    }

    /// Move to the next or previous system. Returns false when a system
    /// transition is still running and the request is dropped.
    pub fn step_system(&mut self, library: &Library, direction: Direction, now: Instant) -> bool {
        if self.system_anim.is_busy(now) {
            return false;
        }
        let len = library.systems.len();
        self.system_index = match direction {
            Direction::Forward => wrap_next(self.system_index, len),
            Direction::Backward => wrap_prev(self.system_index, len),
        };
        self.refresh_category(library);
        self.system_anim = Animation::start(direction, now);
        true
    }

    /// Move to the next or previous game of the category. Returns false when a
    /// game transition is still running and the request is dropped.
    pub fn step_game(&mut self, direction: Direction, now: Instant) -> bool {
        if self.game_anim.is_busy(now) {
            return false;
        }
        let len = self.category.len();
        self.game_index = match direction {
            Direction::Forward => wrap_next(self.game_index, len),
            Direction::Backward => wrap_prev(self.game_index, len),
        };
        self.game_anim = Animation::start(direction, now);
        true
    }

    /// Retire finished transitions, reporting the system axis first.
    pub fn tick(&mut self, now: Instant) -> Option<Settled> {
        if let Animation::Animating { until, .. } = self.system_anim {
            if now >= until {
                self.system_anim = Animation::Idle;
                return Some(Settled::System);
            }
        }
        if let Animation::Animating { until, .. } = self.game_anim {
            if now >= until {
                self.game_anim = Animation::Idle;
                return Some(Settled::Game);
            }
        }
        None
    }

    /// Index into the full game list of the highlighted game.
    pub fn current_game_index(&self) -> Option<usize> {
        self.category.get(self.game_index).copied()
    }

    pub fn current_game<'a>(&self, library: &'a Library) -> Option<&'a Game> {
        self.current_game_index().and_then(|i| library.games.get(i))
    }

    pub fn current_system<'a>(&self, library: &'a Library) -> Option<&'a System> {
        library.systems.get(self.system_index)
    }

    /// Previous and next systems around the current one (wrapping).
    pub fn neighbour_systems<'a>(&self, library: &'a Library) -> (Option<&'a System>, Option<&'a System>) {
        let len = library.systems.len();
        (
            library.systems.get(wrap_prev(self.system_index, len)),
            library.systems.get(wrap_next(self.system_index, len)),
        )
    }

    /// Previous and next games around the current one inside the category.
    pub fn neighbour_games<'a>(&self, library: &'a Library) -> (Option<&'a Game>, Option<&'a Game>) {
        let len = self.category.len();
        let at = |i: usize| self.category.get(i).and_then(|&g| library.games.get(g));
        (
            at(wrap_prev(self.game_index, len)),
            at(wrap_next(self.game_index, len)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::{game, system};

    fn lib() -> Library {
        Library::new(
            "unused",
            vec![system("nes", "NES"), system("gb", "Game Boy"), system("md", "Mega Drive")],
            vec![
                game("Mario", "nes"),
                game("Zelda", "nes"),
                game("Tetris", "gb"),
                game("Sonic", "md"),
                game("Streets", "md"),
                game("Columns", "md"),
            ],
        )
    }

    #[test]
    fn right_len_times_returns_to_start() {
        let lib = lib();
        let mut nav = Navigation::new(&lib);
        let mut now = Instant::now();
        let start = nav.system_index();
        for _ in 0..lib.systems.len() {
            assert!(nav.step_system(&lib, Direction::Forward, now));
            now += CAROUSEL_TRANSITION;
            nav.tick(now);
        }
        assert_eq!(nav.system_index(), start);
    }

    #[test]
    fn category_tracks_system_after_every_change() {
        let lib = lib();
        let mut nav = Navigation::new(&lib);
        let mut now = Instant::now();
        for dir in [Direction::Forward, Direction::Forward, Direction::Backward, Direction::Backward, Direction::Backward] {
            nav.step_system(&lib, dir, now);
            now += CAROUSEL_TRANSITION;
            nav.tick(now);
            let id = &lib.systems[nav.system_index()].system_identifier;
            let expected: Vec<usize> = lib
                .games
                .iter()
                .enumerate()
                .filter(|(_, g)| &g.game_system == id)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(nav.category(), expected.as_slice());
            assert_eq!(nav.game_index(), 0);
        }
    }

    #[test]
    fn empty_library_stays_at_zero() {
        let lib = Library::default();
        let mut nav = Navigation::new(&lib);
        let now = Instant::now();
        nav.step_system(&lib, Direction::Forward, now);
        nav.step_game(Direction::Backward, now + CAROUSEL_TRANSITION);
        assert_eq!(nav.system_index(), 0);
        assert_eq!(nav.game_index(), 0);
        assert!(nav.category().is_empty());
        assert!(nav.current_game(&lib).is_none());
        assert_eq!(nav.neighbour_systems(&lib), (None, None));
    }

    #[test]
    fn single_system_wraps_onto_itself() {
        let lib = Library::new("unused", vec![system("nes", "NES")], vec![game("Mario", "nes")]);
        let mut nav = Navigation::new(&lib);
        let mut now = Instant::now();
        for _ in 0..2 {
            nav.step_system(&lib, Direction::Forward, now);
            now += CAROUSEL_TRANSITION;
            nav.tick(now);
        }
        assert_eq!(nav.system_index(), 0);
        assert_eq!(nav.current_game(&lib).unwrap().game_name, "Mario");
        assert_eq!(nav.category().len(), 1);
    }

    #[test]
    fn busy_axis_drops_requests() {
        let lib = lib();
        let mut nav = Navigation::new(&lib);
        let now = Instant::now();
        assert!(nav.step_system(&lib, Direction::Forward, now));
        assert!(!nav.step_system(&lib, Direction::Forward, now + Duration::from_millis(100)));
        assert!(!nav.step_system(&lib, Direction::Backward, now + Duration::from_millis(200)));
        assert_eq!(nav.system_index(), 1);
        // game axis is independent
        assert!(nav.step_game(Direction::Forward, now + Duration::from_millis(100)));
        assert_eq!(nav.tick(now + CAROUSEL_TRANSITION), Some(Settled::System));
        assert!(nav.step_system(&lib, Direction::Forward, now + CAROUSEL_TRANSITION));
    }

    #[test]
    fn game_steps_wrap_within_category() {
        let lib = lib();
        let mut nav = Navigation::new(&lib);
        // Game Boy, Mega Drive, NES after sorting
        nav.select_game(&lib, lib.game_index_by_name("Sonic").unwrap());
        assert_eq!(nav.category().len(), 3);
        let mut now = Instant::now();
        nav.step_game(Direction::Backward, now);
        assert_eq!(nav.current_game(&lib).unwrap().game_name, "Columns");
        now += CAROUSEL_TRANSITION;
        nav.tick(now);
        nav.step_game(Direction::Backward, now);
        assert_eq!(nav.game_index(), 2);
        now += CAROUSEL_TRANSITION;
        nav.tick(now);
        nav.step_game(Direction::Forward, now);
        assert_eq!(nav.game_index(), 0);
    }

    #[test]
    fn neighbours_wrap_and_degrade() {
        let lib = lib();
        let mut nav = Navigation::new(&lib);
        nav.select_game(&lib, lib.game_index_by_name("Tetris").unwrap());
        let (prev, next) = nav.neighbour_games(&lib);
        assert_eq!(prev.unwrap().game_name, "Tetris");
        assert_eq!(next.unwrap().game_name, "Tetris");
        let (prev, next) = nav.neighbour_systems(&lib);
        assert_eq!(prev.unwrap().system_identifier, "nes");
        assert_eq!(next.unwrap().system_identifier, "md");
    }

    #[test]
    fn select_game_with_dangling_system_is_refused() {
        let mut lib = lib();
        lib.games.push(game("Orphan", "none"));
        let mut nav = Navigation::new(&lib);
        let orphan = lib.game_index_by_name("Orphan").unwrap();
        assert!(!nav.select_game(&lib, orphan));
        assert_eq!(nav.system_index(), 0);
    }
}
