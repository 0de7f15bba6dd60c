//! The frontend state machine: owns the loaded data and the platform
//! strategies, turns raw input into navigation and launches, and runs the
//! idle sequences. The renderer only ever sees a [`FrontendView`].

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::display::{self, Fade, Language, FADE_DURATION};
use crate::idle::{
    pick_random_game, AttractStep, CancellableSequence, IdleTimer, SequencePoll, SleepStep,
    ATTRACT_STEPS, SETTLE, SLEEP_STEPS, WAKE_STEPS,
};
use crate::input::{Action, InputRouter, KeyMap, RawInput, Routed};
use crate::launch::{LaunchEvent, Supervisor};
use crate::library::Library;
use crate::navigation::{Direction, Navigation, Settled};
use crate::preview::{
    CommandPreviewPlayer, NoPreview, PreviewClip, PreviewPlayer, PreviewSchedule, PREVIEW_REFOCUS,
    PREVIEW_SETTLE,
};
use crate::process::{
    default_window_control, DesktopPowerSave, PowerSave, ProcessHost, SystemProcessHost,
    WindowControl,
};
use crate::settings::Settings;

/// Everything loaded from disk at startup.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub library: Library,
}

impl AppContext {
    pub fn new(settings: Settings, settings_path: impl Into<PathBuf>, library: Library) -> Self {
        AppContext {
            settings,
            settings_path: settings_path.into(),
            library,
        }
    }

    /// Load the settings file, then the library it points at.
    pub fn load(settings_path: impl Into<PathBuf>) -> Self {
        let settings_path = settings_path.into();
        let settings = Settings::load(&settings_path);
        let library = Library::load(&settings.library_dir());
        AppContext {
            settings,
            settings_path,
            library,
        }
    }
}

/// Platform behaviour the frontend drives.
pub struct Platform {
    pub host: Box<dyn ProcessHost>,
    pub windows: Box<dyn WindowControl>,
    pub power: Box<dyn PowerSave>,
    pub preview: Box<dyn PreviewPlayer>,
}

impl Platform {
    /// Real processes, xdotool when an X display is around, the desktop's
    /// power-save command and the configured preview player, placed for a
    /// window of `screen` pixels.
    pub fn system(settings: &Settings, screen: (i32, i32)) -> Self {
        let preview: Box<dyn PreviewPlayer> = match CommandPreviewPlayer::new(&settings.preview_command, screen) {
            Some(player) => Box::new(player),
            None => Box::new(NoPreview),
        };
        Platform {
            host: Box::new(SystemProcessHost::new()),
            windows: default_window_control(),
            power: Box::new(DesktopPowerSave::from_env()),
            preview,
        }
    }
}

#[derive(Debug)]
enum SleepState {
    Awake,
    Entering(CancellableSequence<SleepStep>),
    Asleep,
    Waking(CancellableSequence<SleepStep>),
}

/// Details of the highlighted game.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameCard {
    pub name: String,
    pub description: String,
    pub genres: String,
    pub developer: String,
    pub release_year: String,
    pub played_time: String,
    pub logo: Option<PathBuf>,
    pub background: Option<PathBuf>,
}

/// One frame's worth of state for the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontendView {
    pub system_name: String,
    pub system_logo: Option<PathBuf>,
    /// Neighbours on the system axis as (name, logo).
    pub prev_system: Option<(String, Option<PathBuf>)>,
    pub next_system: Option<(String, Option<PathBuf>)>,
    pub game: Option<GameCard>,
    pub prev_game: Option<(String, Option<PathBuf>)>,
    pub next_game: Option<(String, Option<PathBuf>)>,
    pub title_counter: String,
    /// Direction and completion (0..1) of running carousel transitions.
    pub system_slide: Option<(Direction, f32)>,
    pub game_slide: Option<(Direction, f32)>,
    /// Margins of the video area, when a clip is showing.
    pub video_margins: Option<(i32, i32, i32, i32)>,
    /// Opacity of the black overlay.
    pub fade: f32,
    pub loading: Option<&'static str>,
    pub popup: Option<&'static str>,
}

pub struct Frontend {
    ctx: AppContext,
    platform: Platform,
    router: InputRouter,
    nav: Navigation,
    supervisor: Supervisor,
    attract_timer: IdleTimer,
    sleep_timer: IdleTimer,
    attract: Option<CancellableSequence<AttractStep>>,
    sleep: SleepState,
    fade: Fade,
    preview: PreviewSchedule,
    preview_playing: bool,
    /// When to take window focus back from a freshly started player.
    refocus: Option<Instant>,
    popup_open: bool,
    quit: bool,
    language: Language,
    rng: StdRng,
}

impl Frontend {
    pub fn new(ctx: AppContext, platform: Platform, now: Instant) -> Self {
        let settings = &ctx.settings;
        let router = InputRouter::new(KeyMap::from_settings(settings));
        let attract_timer = IdleTimer::new(
            settings.allow_inactivity_mode,
            Duration::from_secs(settings.seconds_before_random_game_selection_inactivity_mode),
        );
        let sleep_timer = IdleTimer::new(
            settings.allow_screen_sleep,
            Duration::from_secs(settings.seconds_before_shutdown_screen),
        );
        let language = Language::from_setting(&settings.language);

        let mut nav = Navigation::new(&ctx.library);
        let startup = settings.startup_game();
        if !startup.is_empty() {
            match ctx.library.game_index_by_name(startup) {
                Some(game) if nav.select_game(&ctx.library, game) => {
                    tracing::info!("Starting on {}", startup)
                }
                _ => tracing::warn!("Startup game {:?} not found, using first entry", startup),
            }
        }

        let mut frontend = Frontend {
            ctx,
            platform,
            router,
            nav,
            supervisor: Supervisor::new(),
            attract_timer,
            sleep_timer,
            attract: None,
            sleep: SleepState::Awake,
            fade: Fade::Clear,
            preview: PreviewSchedule::default(),
            preview_playing: false,
            refocus: None,
            popup_open: false,
            quit: false,
            language,
            rng: StdRng::from_entropy(),
        };
        frontend.rearm_timers(now);
        frontend.preview.schedule(now, Duration::ZERO);
        frontend
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn is_in_game(&self) -> bool {
        self.supervisor.is_in_game()
    }

    pub fn is_sleeping(&self) -> bool {
        !matches!(self.sleep, SleepState::Awake)
    }

    pub fn popup_open(&self) -> bool {
        self.popup_open
    }

    pub fn navigation(&self) -> &Navigation {
        &self.nav
    }

    pub fn library(&self) -> &Library {
        &self.ctx.library
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    /// Earliest instant at which `tick` has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.attract_timer.deadline(),
            self.sleep_timer.deadline(),
            self.preview.due(),
            self.refocus,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn handle_input(&mut self, input: &RawInput, now: Instant) {
        let routed = self.router.route(input, self.supervisor.is_in_game());
        let action = match routed {
            Routed::Ignored => return,
            Routed::ForceKill => {
                self.supervisor
                    .kill_running_game(self.platform.host.as_ref(), now);
                return;
            }
            Routed::Activity => None,
            Routed::Action(action) => Some(action),
        };

        match self.sleep {
            SleepState::Awake => {}
            SleepState::Entering(_) | SleepState::Asleep => {
                self.wake(now);
                return;
            }
            SleepState::Waking(_) => return,
        }

        self.cancel_attract();
        self.rearm_timers(now);
        if let Some(action) = action {
            self.dispatch(action, now);
        }
    }

    fn dispatch(&mut self, action: Action, now: Instant) {
        tracing::trace!("Action {:?}", action);
        match action {
            Action::Select if self.popup_open => {
                tracing::info!("Shutdown requested");
                self.quit = true;
            }
            Action::Select => self.launch_current(now),
            Action::Back => {
                if self.popup_open {
                    self.set_popup(false, now);
                }
            }
            Action::Exit => self.set_popup(!self.popup_open, now),
            _ if self.popup_open => {}
            Action::Left => {
                self.nav
                    .step_system(&self.ctx.library, Direction::Backward, now);
            }
            Action::Right => {
                self.nav
                    .step_system(&self.ctx.library, Direction::Forward, now);
            }
            Action::Up => {
                if self.nav.step_game(Direction::Backward, now) {
                    self.on_game_changed(now);
                }
            }
            Action::Down => {
                if self.nav.step_game(Direction::Forward, now) {
                    self.on_game_changed(now);
                }
            }
        }
    }

    fn set_popup(&mut self, open: bool, now: Instant) {
        self.popup_open = open;
        if open {
            self.stop_preview();
        } else {
            self.preview.schedule(now, Duration::ZERO);
        }
    }

    fn launch_current(&mut self, now: Instant) {
        let Some(game) = self.nav.current_game_index() else {
            return;
        };
        let system = self.nav.system_index();
        if !self.supervisor.begin(&self.ctx.library, system, game, now) {
            return;
        }
        self.stop_preview();
        self.cancel_attract();
        self.attract_timer.disarm();
        self.sleep_timer.disarm();
    }

    fn on_game_changed(&mut self, now: Instant) {
        if let Some(game) = self.nav.current_game(&self.ctx.library) {
            let settings = &mut self.ctx.settings;
            if settings.last_selected_game != game.game_name {
                settings.last_selected_game = game.game_name.clone();
                if let Err(e) = settings.save(&self.ctx.settings_path) {
                    tracing::warn!("Failed to save last selected game: {}", e);
                }
            }
        }
        self.stop_preview();
        self.preview.schedule(now, PREVIEW_SETTLE);
    }

    fn stop_preview(&mut self) {
        self.preview.cancel();
        self.refocus = None;
        if self.preview_playing {
            self.platform.preview.stop();
            self.preview_playing = false;
        }
    }

    fn rearm_timers(&mut self, now: Instant) {
        self.attract_timer.arm(now);
        self.sleep_timer.arm(now);
    }

    fn cancel_attract(&mut self) {
        if let Some(seq) = self.attract.take() {
            seq.cancel();
            self.fade = Fade::Clear;
        }
    }

    fn wake(&mut self, now: Instant) {
        tracing::info!("Waking from screen sleep");
        if let SleepState::Entering(seq) = &self.sleep {
            seq.cancel();
        }
        self.sleep = SleepState::Waking(CancellableSequence::start(WAKE_STEPS, now));
        self.run_sleep(now);
    }

    /// Advance animations, timers, idle sequences, the launch and the preview.
    pub fn tick(&mut self, now: Instant) {
        while let Some(settled) = self.nav.tick(now) {
            if settled == Settled::System {
                self.on_game_changed(now);
            }
        }

        let event = self.supervisor.tick(
            now,
            &mut self.ctx.library,
            self.platform.host.as_mut(),
            self.platform.windows.as_mut(),
        );
        if let Some(LaunchEvent::Finished) = event {
            self.rearm_timers(now);
            self.preview.schedule(now, Duration::ZERO);
        }
        if self.supervisor.is_in_game() {
            return;
        }

        if self.attract_timer.fire(now) {
            if self.popup_open || self.is_sleeping() {
                self.attract_timer.arm(now);
            } else {
                tracing::debug!("Inactivity: selecting a random game");
                self.attract = Some(CancellableSequence::start(ATTRACT_STEPS, now));
            }
        }
        if self.sleep_timer.fire(now) && !self.is_sleeping() {
            tracing::info!("Inactivity: putting the screen to sleep");
            self.cancel_attract();
            self.attract_timer.disarm();
            self.sleep = SleepState::Entering(CancellableSequence::start(SLEEP_STEPS, now));
        }

        self.run_attract(now);
        self.run_sleep(now);

        if self.preview.take_due(now) {
            self.start_preview(now);
        }
        if self.refocus.is_some_and(|at| now >= at) {
            self.refocus = None;
            self.platform.windows.bring_to_front(std::process::id());
        }
    }

    fn start_preview(&mut self, now: Instant) {
        if self.popup_open || self.is_sleeping() {
            return;
        }
        let clip = self
            .nav
            .current_game(&self.ctx.library)
            .and_then(|g| PreviewClip::for_game(g, &self.ctx.library));
        match clip {
            Some(clip) => {
                self.platform.preview.play(&clip);
                self.preview_playing = true;
                self.refocus = Some(now + PREVIEW_REFOCUS);
            }
            None => self.stop_preview(),
        }
    }

    fn run_attract(&mut self, now: Instant) {
        let Some(mut seq) = self.attract.take() else {
            return;
        };
        loop {
            match seq.poll(now) {
                SequencePoll::Pending => break,
                SequencePoll::Step(AttractStep::FadeOut) => {
                    self.fade = Fade::out(now);
                    seq.wait(now, FADE_DURATION);
                }
                SequencePoll::Step(AttractStep::Settle) => seq.wait(now, SETTLE),
                SequencePoll::Step(AttractStep::PickRandomGame) => self.pick_random_game(now),
                SequencePoll::Step(AttractStep::FadeIn) => {
                    self.fade = Fade::fade_in(now);
                    seq.wait(now, FADE_DURATION);
                }
                SequencePoll::Step(AttractStep::Rearm) => self.attract_timer.arm(now),
                SequencePoll::Cancelled => {
                    self.fade = Fade::Clear;
                    return;
                }
                SequencePoll::Finished => return,
            }
        }
        self.attract = Some(seq);
    }

    fn pick_random_game(&mut self, now: Instant) {
        let library = &self.ctx.library;
        let current = self.nav.current_game_index();
        let picked = pick_random_game(&mut self.rng, library.games.len(), current, |i| {
            library.system_of(i).is_some()
        });
        match picked {
            Some(game) if self.nav.select_game(library, game) => {
                tracing::info!("Random pick: {}", library.games[game].game_name);
                self.on_game_changed(now);
            }
            _ => tracing::debug!("Not enough games for a random pick"),
        }
    }

    fn run_sleep(&mut self, now: Instant) {
        let (mut seq, waking) = match std::mem::replace(&mut self.sleep, SleepState::Awake) {
            SleepState::Entering(seq) => (seq, false),
            SleepState::Waking(seq) => (seq, true),
            other => {
                self.sleep = other;
                return;
            }
        };
        loop {
            match seq.poll(now) {
                SequencePoll::Pending => break,
                SequencePoll::Step(SleepStep::FadeOut) => {
                    self.fade = Fade::out(now);
                    self.stop_preview();
                    seq.wait(now, FADE_DURATION);
                }
                SequencePoll::Step(SleepStep::PowerSave) => self.platform.power.power_save(),
                SequencePoll::Step(SleepStep::FadeIn) => {
                    self.fade = Fade::fade_in(now);
                    seq.wait(now, FADE_DURATION);
                }
                SequencePoll::Step(SleepStep::Resume) => {
                    self.rearm_timers(now);
                    self.preview.schedule(now, Duration::ZERO);
                }
                SequencePoll::Finished => {
                    self.sleep = if waking {
                        SleepState::Awake
                    } else {
                        SleepState::Asleep
                    };
                    return;
                }
                SequencePoll::Cancelled => return,
            }
        }
        self.sleep = if waking {
            SleepState::Waking(seq)
        } else {
            SleepState::Entering(seq)
        };
    }

    pub fn view(&self, now: Instant) -> FrontendView {
        let library = &self.ctx.library;
        let labels = display::labels(self.language);
        let asset = |name: &str| library.asset_path(name);

        let system = self.nav.current_system(library);
        let (prev_system, next_system) = self.nav.neighbour_systems(library);
        let game = self.nav.current_game(library);
        let (prev_game, next_game) = self.nav.neighbour_games(library);

        let card = game.map(|g| GameCard {
            name: g.game_name.clone(),
            description: g.game_description.clone(),
            genres: display::genres_text(&g.game_genres),
            developer: g.game_developer.clone(),
            release_year: g.game_release_year.clone(),
            played_time: display::played_time_text(g.game_played_time, self.language),
            logo: asset(&g.game_logo),
            background: asset(&g.game_background_picture),
        });

        let video_margins = if self.preview_playing {
            game.and_then(|g| PreviewClip::for_game(g, library))
                .map(|clip| clip.layout.margins)
        } else {
            None
        };

        let launch_fade = self.supervisor.fade_opacity(now).unwrap_or(0.0);
        FrontendView {
            system_name: system.map(|s| s.system_display_name.clone()).unwrap_or_default(),
            system_logo: system.and_then(|s| asset(&s.system_logo)),
            prev_system: prev_system.map(|s| (s.system_display_name.clone(), asset(&s.system_logo))),
            next_system: next_system.map(|s| (s.system_display_name.clone(), asset(&s.system_logo))),
            game: card,
            prev_game: prev_game.map(|g| (g.game_name.clone(), asset(&g.game_logo))),
            next_game: next_game.map(|g| (g.game_name.clone(), asset(&g.game_logo))),
            title_counter: display::title_counter_text(
                self.nav.game_index(),
                self.nav.category().len(),
                library.games.len(),
                self.language,
            ),
            system_slide: self.nav.system_animation().progress(now),
            game_slide: self.nav.game_animation().progress(now),
            video_margins,
            fade: self.fade.opacity(now).max(launch_fade),
            loading: self.supervisor.loading_visible().then_some(labels.loading),
            popup: self.popup_open.then_some(labels.confirm_exit),
        }
    }
}
