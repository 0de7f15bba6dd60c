//! Game launch supervision: fade out, spawn the system's emulator or
//! launcher, wait for the game to end, account play time, fade back in.

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::display::{fade_opacity, FADE_DURATION};
use crate::idle::{CancellableSequence, SequencePoll, SETTLE};
use crate::library::{Game, Library, System};
use crate::process::{KillStep, KillTarget, ProcessHost, TrackedProcess, WindowControl};

/// Replaced by the game's argument string.
pub const GAME_ARGS_TOKEN: &str = "{GAME_ARGS}";
/// Older templates name the same value after the rom file.
pub const GAME_FILE_TOKEN: &str = "{GAME_FILE}";
/// Separates rom and watched process name when both live in the args field.
pub const WATCH_SEPARATOR: char = '|';

pub const COMPANION_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const COMPANION_TIMEOUT: Duration = Duration::from_secs(40);
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(150);

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no system at index {0}")]
    NoSystem(usize),

    #[error("no game selected")]
    NoGame,

    #[error("system {0} has no executable configured")]
    NoExecutable(String),

    #[error("launcher system {system} has no process to watch for game {game}")]
    NoWatchProcess { system: String, game: String },

    #[error("invalid argument template for {system}: {source}")]
    Template {
        system: String,
        #[source]
        source: shell_words::ParseError,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fully resolved process invocation for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Companion process to wait for, set for launcher systems.
    pub watch_process: Option<String>,
}

impl LaunchCommand {
    pub fn resolve(system: &System, game: &Game) -> Result<LaunchCommand, LaunchError> {
        if system.system_executable.trim().is_empty() {
            return Err(LaunchError::NoExecutable(system.system_identifier.clone()));
        }
        let (game_ref, watch_process) = if system.system_is_game_launcher {
            let (rom, watch) = split_watch(game);
            if watch.is_empty() {
                return Err(LaunchError::NoWatchProcess {
                    system: system.system_identifier.clone(),
                    game: game.game_name.clone(),
                });
            }
            (rom, Some(watch))
        } else {
            (game_reference(game), None)
        };

        // split first so a reference containing spaces stays one argument
        let words = shell_words::split(&system.system_executable_arguments).map_err(|source| {
            LaunchError::Template {
                system: system.system_identifier.clone(),
                source,
            }
        })?;
        let args = words
            .into_iter()
            .map(|w| w.replace(GAME_ARGS_TOKEN, &game_ref).replace(GAME_FILE_TOKEN, &game_ref))
            .collect();

        Ok(LaunchCommand {
            program: system.system_executable.clone(),
            args,
            watch_process,
        })
    }
}

fn game_reference(game: &Game) -> String {
    if game.game_process_args.is_empty() {
        game.game_rom_identifier.clone()
    } else {
        game.game_process_args.clone()
    }
}

/// Rom reference and watched process name of a launcher game. An explicit
/// watch name wins; otherwise the args field may carry `rom|process`.
fn split_watch(game: &Game) -> (String, String) {
    if !game.game_process_name_to_watch.is_empty() {
        return (game_reference(game), game.game_process_name_to_watch.clone());
    }
    match game.game_process_args.split_once(WATCH_SEPARATOR) {
        Some((rom, watch)) => (rom.trim().to_string(), watch.trim().to_string()),
        None => (game_reference(game), String::new()),
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The game exited on its own.
    Completed,
    /// Ended through the force-kill chord.
    UserKilled,
    /// The companion process never appeared.
    TimedOut,
    /// Nothing could be started.
    Failed,
}

impl Outcome {
    pub fn counts_play_time(self) -> bool {
        matches!(self, Outcome::Completed | Outcome::UserKilled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaunchEvent {
    /// Processes are gone and play time is accounted; the screen fades in next.
    SessionEnded {
        game: usize,
        outcome: Outcome,
        played: Duration,
    },
    /// Back to the carousel.
    Finished,
}

#[derive(Debug)]
pub enum Phase {
    Idle,
    FadingOut { until: Instant },
    Loading { until: Instant },
    RunningPrimary { next_poll: Instant },
    AwaitingCompanion { next_poll: Instant, deadline: Instant },
    RunningCompanion { next_poll: Instant },
    Terminating {
        plan: CancellableSequence<KillStep>,
        outcome: Outcome,
    },
    FadingIn { until: Instant },
}

#[derive(Debug)]
struct Session {
    game: usize,
    system: usize,
    exit_launcher_on_game_exit: bool,
    started: Option<Instant>,
    primary: Option<TrackedProcess>,
    companion: Option<TrackedProcess>,
    watch_process: Option<String>,
}

/// The launch state machine. Advanced by `tick` from the UI loop.
#[derive(Debug)]
pub struct Supervisor {
    phase: Phase,
    session: Option<Session>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Supervisor {
            phase: Phase::Idle,
            session: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_in_game(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// True while a process is being supervised and the kill chord applies.
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            Phase::RunningPrimary { .. } | Phase::AwaitingCompanion { .. } | Phase::RunningCompanion { .. }
        )
    }

    pub fn loading_visible(&self) -> bool {
        matches!(
            self.phase,
            Phase::Loading { .. }
                | Phase::RunningPrimary { .. }
                | Phase::AwaitingCompanion { .. }
                | Phase::RunningCompanion { .. }
                | Phase::Terminating { .. }
        )
    }

    /// Opacity of the black overlay owned by the launch, if any.
    pub fn fade_opacity(&self, now: Instant) -> Option<f32> {
        match self.phase {
            Phase::Idle => None,
            Phase::FadingOut { until } => Some(fade_opacity(0.0, 1.0, until, now)),
            Phase::FadingIn { until } => Some(fade_opacity(1.0, 0.0, until, now)),
            _ => Some(1.0),
        }
    }

    /// Start launching the game at `game` (index into the full list) on the
    /// system at `system`. Ignored while a launch is already in progress.
    pub fn begin(&mut self, library: &Library, system: usize, game: usize, now: Instant) -> bool {
        if self.is_in_game() {
            return false;
        }
        let exit_launcher_on_game_exit = library
            .systems
            .get(system)
            .map(|s| s.exit_launcher_on_game_exit)
            .unwrap_or(false);
        self.session = Some(Session {
            game,
            system,
            exit_launcher_on_game_exit,
            started: None,
            primary: None,
            companion: None,
            watch_process: None,
        });
        self.phase = Phase::FadingOut {
            until: now + FADE_DURATION,
        };
        true
    }

    /// Force-kill the supervised processes. No-op unless a game is running.
    pub fn kill_running_game(&mut self, host: &dyn ProcessHost, now: Instant) -> bool {
        if !self.is_running() {
            return false;
        }
        tracing::info!("Force-killing running game");
        self.start_kill(host, Outcome::UserKilled, now);
        true
    }

    pub fn tick(
        &mut self,
        now: Instant,
        library: &mut Library,
        host: &mut dyn ProcessHost,
        windows: &mut dyn WindowControl,
    ) -> Option<LaunchEvent> {
        match self.advance(now, library, host, windows) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Game launch failed: {}", e);
                Some(self.finish(now, Outcome::Failed, library))
            }
        }
    }

    fn advance(
        &mut self,
        now: Instant,
        library: &mut Library,
        host: &mut dyn ProcessHost,
        windows: &mut dyn WindowControl,
    ) -> Result<Option<LaunchEvent>, LaunchError> {
        match self.phase {
            Phase::Idle => Ok(None),
            Phase::FadingOut { until } => {
                if now >= until {
                    self.phase = Phase::Loading { until: now + SETTLE };
                }
                Ok(None)
            }
            Phase::Loading { until } => {
                if now >= until {
                    self.start_processes(now, library, host, windows)?;
                }
                Ok(None)
            }
            Phase::RunningPrimary { next_poll } => {
                if now < next_poll {
                    return Ok(None);
                }
                let exited = match self.session.as_mut().and_then(|s| s.primary.as_mut()) {
                    Some(p) => host.has_exited(p),
                    None => true,
                };
                if exited {
                    return Ok(self.after_game_exit(now, library, host));
                }
                self.phase = Phase::RunningPrimary {
                    next_poll: now + EXIT_POLL_INTERVAL,
                };
                Ok(None)
            }
            Phase::AwaitingCompanion { next_poll, deadline } => {
                if now < next_poll {
                    return Ok(None);
                }
                self.poll_companion(now, deadline, host, windows);
                Ok(None)
            }
            Phase::RunningCompanion { next_poll } => {
                if now < next_poll {
                    return Ok(None);
                }
                let exited = match self.session.as_mut().and_then(|s| s.companion.as_mut()) {
                    Some(c) => host.has_exited(c),
                    None => true,
                };
                if exited {
                    return Ok(self.after_game_exit(now, library, host));
                }
                self.phase = Phase::RunningCompanion {
                    next_poll: now + EXIT_POLL_INTERVAL,
                };
                Ok(None)
            }
            Phase::Terminating { .. } => Ok(self.run_kill_plan(now, library, host)),
            Phase::FadingIn { until } => {
                if now < until {
                    return Ok(None);
                }
                self.phase = Phase::Idle;
                self.session = None;
                Ok(Some(LaunchEvent::Finished))
            }
        }
    }

    fn start_processes(
        &mut self,
        now: Instant,
        library: &Library,
        host: &mut dyn ProcessHost,
        windows: &mut dyn WindowControl,
    ) -> Result<(), LaunchError> {
        let session = self.session.as_mut().ok_or(LaunchError::NoGame)?;
        let system = library
            .systems
            .get(session.system)
            .ok_or(LaunchError::NoSystem(session.system))?;
        let game = library.games.get(session.game).ok_or(LaunchError::NoGame)?;
        let command = LaunchCommand::resolve(system, game)?;
        tracing::info!(
            "Launching {} on {}: {} {:?}",
            game.game_name,
            system.system_identifier,
            command.program,
            command.args
        );

        let primary = host.spawn(&command)?;
        session.started = Some(now);
        match command.watch_process {
            None => {
                windows.bring_to_front(primary.pid);
                self.phase = Phase::RunningPrimary { next_poll: now };
            }
            Some(name) => {
                session.watch_process = Some(name);
                self.phase = Phase::AwaitingCompanion {
                    next_poll: now,
                    deadline: now + COMPANION_TIMEOUT,
                };
            }
        }
        session.primary = Some(primary);
        Ok(())
    }

    fn poll_companion(
        &mut self,
        now: Instant,
        deadline: Instant,
        host: &mut dyn ProcessHost,
        windows: &mut dyn WindowControl,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(p) = session.primary.as_ref() {
            windows.minimize(p.pid);
        }
        let found = session
            .watch_process
            .as_deref()
            .and_then(|name| host.find_by_name(name));
        match found {
            Some(companion) => {
                tracing::info!("Companion {} started (pid={})", companion.name, companion.pid);
                windows.bring_to_front(companion.pid);
                session.companion = Some(companion);
                self.phase = Phase::RunningCompanion {
                    next_poll: now + EXIT_POLL_INTERVAL,
                };
            }
            None if now >= deadline => {
                tracing::warn!(
                    "Companion {:?} not found after {:?}, giving up",
                    session.watch_process,
                    COMPANION_TIMEOUT
                );
                self.start_kill(host, Outcome::TimedOut, now);
            }
            None => {
                self.phase = Phase::AwaitingCompanion {
                    next_poll: now + COMPANION_POLL_INTERVAL,
                    deadline,
                };
            }
        }
    }

    fn after_game_exit(
        &mut self,
        now: Instant,
        library: &mut Library,
        host: &mut dyn ProcessHost,
    ) -> Option<LaunchEvent> {
        let kill_launcher = self
            .session
            .as_ref()
            .map(|s| s.exit_launcher_on_game_exit)
            .unwrap_or(false);
        if kill_launcher {
            self.start_kill(host, Outcome::Completed, now);
            return self.run_kill_plan(now, library, host);
        }
        Some(self.finish(now, Outcome::Completed, library))
    }

    fn start_kill(&mut self, host: &dyn ProcessHost, outcome: Outcome, now: Instant) {
        self.phase = Phase::Terminating {
            plan: CancellableSequence::start(host.kill_plan(), now),
            outcome,
        };
    }

    fn run_kill_plan(
        &mut self,
        now: Instant,
        library: &mut Library,
        host: &mut dyn ProcessHost,
    ) -> Option<LaunchEvent> {
        let Phase::Terminating { plan, outcome } = &mut self.phase else {
            return None;
        };
        let outcome = *outcome;
        loop {
            match plan.poll(now) {
                SequencePoll::Pending => return None,
                SequencePoll::Step(KillStep::Settle) => plan.wait(now, SETTLE),
                SequencePoll::Step(KillStep::Signal(target, signal)) => {
                    let process = self.session.as_mut().and_then(|s| match target {
                        KillTarget::Companion => s.companion.as_mut(),
                        KillTarget::Primary => s.primary.as_mut(),
                    });
                    if let Some(p) = process {
                        host.signal(p, signal);
                    }
                }
                SequencePoll::Finished | SequencePoll::Cancelled => break,
            }
        }
        Some(self.finish(now, outcome, library))
    }

    /// Account play time and start fading back in. Every path out of a
    /// launch, failed or not, ends here.
    fn finish(&mut self, now: Instant, outcome: Outcome, library: &mut Library) -> LaunchEvent {
        let (game, played) = match self.session.as_ref() {
            Some(s) => (
                s.game,
                s.started.map(|t| now.saturating_duration_since(t)).unwrap_or_default(),
            ),
            None => (0, Duration::ZERO),
        };
        tracing::info!("Session ended: {:?} after {:?}", outcome, played);

        if outcome.counts_play_time() && !played.is_zero() {
            if let Some(g) = library.games.get_mut(game) {
                g.game_played_time += played.as_secs_f64();
                if let Err(e) = library.save_games() {
                    tracing::warn!("Failed to save play time: {}", e);
                }
            }
        }

        self.phase = Phase::FadingIn {
            until: now + FADE_DURATION,
        };
        LaunchEvent::SessionEnded {
            game,
            outcome,
            played,
        }
    }
}
