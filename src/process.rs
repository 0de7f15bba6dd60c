//! Platform side of game supervision: spawning, finding, signalling and
//! focusing external processes, plus the desktop power-save hook.

use std::process::{Child, Command, Stdio};
use sysinfo::{Pid, ProcessStatus, Signal};

use crate::launch::{LaunchCommand, LaunchError};

/// A process the supervisor is watching. `child` is set for processes we
/// spawned ourselves; companions found by name only carry a pid.
#[derive(Debug)]
pub struct TrackedProcess {
    pub pid: u32,
    pub name: String,
    pub child: Option<Child>,
}

impl TrackedProcess {
    pub fn external(pid: u32, name: impl Into<String>) -> Self {
        TrackedProcess {
            pid,
            name: name.into(),
            child: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillTarget {
    Companion,
    Primary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    Graceful,
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillStep {
    /// Wait a settle delay before the next step.
    Settle,
    Signal(KillTarget, KillSignal),
}

/// Terminate then kill, companion first, with settle delays in between.
pub const POSIX_KILL_PLAN: &[KillStep] = &[
    KillStep::Settle,
    KillStep::Signal(KillTarget::Companion, KillSignal::Graceful),
    KillStep::Settle,
    KillStep::Signal(KillTarget::Companion, KillSignal::Forced),
    KillStep::Settle,
    KillStep::Signal(KillTarget::Primary, KillSignal::Graceful),
    KillStep::Settle,
    KillStep::Signal(KillTarget::Primary, KillSignal::Forced),
];

/// `taskkill /f /t` by image name, companion first.
pub const TASKKILL_PLAN: &[KillStep] = &[
    KillStep::Signal(KillTarget::Companion, KillSignal::Forced),
    KillStep::Signal(KillTarget::Primary, KillSignal::Forced),
];

pub trait ProcessHost {
    fn spawn(&mut self, command: &LaunchCommand) -> Result<TrackedProcess, LaunchError>;

    /// First running process whose name matches exactly.
    fn find_by_name(&mut self, name: &str) -> Option<TrackedProcess>;

    fn has_exited(&mut self, process: &mut TrackedProcess) -> bool;

    /// Best-effort; failures are logged, never returned.
    fn signal(&mut self, process: &mut TrackedProcess, signal: KillSignal);

    fn kill_plan(&self) -> &'static [KillStep] {
        if cfg!(windows) {
            TASKKILL_PLAN
        } else {
            POSIX_KILL_PLAN
        }
    }
}

/// Real processes through `std::process` and `sysinfo`.
pub struct SystemProcessHost {
    sys: sysinfo::System,
}

impl Default for SystemProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProcessHost {
    pub fn new() -> Self {
        SystemProcessHost {
            sys: sysinfo::System::new(),
        }
    }
}

impl ProcessHost for SystemProcessHost {
    fn spawn(&mut self, command: &LaunchCommand) -> Result<TrackedProcess, LaunchError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        let name = std::path::Path::new(&command.program)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| command.program.clone());
        tracing::info!("Launched {} with pid={}", command.program, child.id());
        Ok(TrackedProcess {
            pid: child.id(),
            name,
            child: Some(child),
        })
    }

    fn find_by_name(&mut self, name: &str) -> Option<TrackedProcess> {
        self.sys.refresh_processes();
        let exe_name = format!("{}.exe", name);
        let found = self
            .sys
            .processes_by_exact_name(name)
            .chain(self.sys.processes_by_exact_name(&exe_name))
            .next()
            .map(|p| p.pid().as_u32());
        found.map(|pid| {
            tracing::debug!("Found companion process {} (pid={})", name, pid);
            TrackedProcess::external(pid, name)
        })
    }

    fn has_exited(&mut self, process: &mut TrackedProcess) -> bool {
        if let Some(child) = process.child.as_mut() {
            return match child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!("{} exited with {}", process.name, status);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    tracing::warn!("Child try_wait error for {}: {}", process.name, e);
                    true
                }
            };
        }
        !self.is_alive(Pid::from_u32(process.pid))
    }

    fn signal(&mut self, process: &mut TrackedProcess, signal: KillSignal) {
        if self.has_exited(process) {
            return;
        }
        if cfg!(windows) {
            if signal == KillSignal::Forced {
                let image = format!("{}.exe", process.name);
                match Command::new("taskkill")
                    .args(["/im", &image, "/f", "/t"])
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                {
                    Ok(status) => tracing::info!("taskkill {} finished with {}", image, status),
                    Err(e) => tracing::warn!("taskkill {} failed: {}", image, e),
                }
            }
            return;
        }

        let sig = match signal {
            KillSignal::Graceful => Signal::Term,
            KillSignal::Forced => Signal::Kill,
        };
        let root = Pid::from_u32(process.pid);
        // collect before signalling: orphans get reparented and drop out of the tree
        for pid in self.descendants(root) {
            self.send(pid, sig);
        }
        if signal == KillSignal::Forced {
            if let Some(child) = process.child.as_mut() {
                if let Err(e) = child.kill() {
                    tracing::warn!("Failed to kill {}: {}", process.name, e);
                }
                // dropping a Child never waits on it
                if let Err(e) = child.wait() {
                    tracing::warn!("Failed to reap {}: {}", process.name, e);
                }
                return;
            }
        }
        self.sys.refresh_process(root);
        self.send(root, sig);
    }
}

impl SystemProcessHost {
    /// Present in the process table and not a zombie.
    fn is_alive(&mut self, pid: Pid) -> bool {
        self.sys.refresh_process(pid)
            && self
                .sys
                .process(pid)
                .map_or(false, |p| p.status() != ProcessStatus::Zombie)
    }

    /// Every process below `root`, parents before their children.
    fn descendants(&mut self, root: Pid) -> Vec<Pid> {
        self.sys.refresh_processes();
        let mut tree = vec![root];
        let mut next = 0;
        while next < tree.len() {
            let parent = tree[next];
            next += 1;
            let children: Vec<Pid> = self
                .sys
                .processes()
                .iter()
                .filter(|(pid, p)| p.parent() == Some(parent) && !tree.contains(pid))
                .map(|(pid, _)| *pid)
                .collect();
            tree.extend(children);
        }
        tree.remove(0);
        tree
    }

    fn send(&self, pid: Pid, sig: Signal) {
        match self.sys.process(pid).and_then(|p| p.kill_with(sig)) {
            Some(true) => tracing::info!("Sent {:?} to pid={}", sig, pid),
            _ => tracing::debug!("Could not send {:?} to pid={}", sig, pid),
        }
    }
}

/// Fire-and-forget helper commands, reaped on later calls.
#[derive(Debug, Default)]
struct Detached {
    children: Vec<Child>,
}

impl Detached {
    fn run(&mut self, program: &str, args: &[&str]) {
        self.children.retain_mut(|c| matches!(c.try_wait(), Ok(None)));
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.children.push(child),
            Err(e) => tracing::debug!("{} unavailable: {}", program, e),
        }
    }
}

/// Foreground/minimize a process's windows.
pub trait WindowControl {
    fn bring_to_front(&mut self, pid: u32);
    fn minimize(&mut self, pid: u32);
}

/// X11 window control through the `xdotool` utility.
#[derive(Debug, Default)]
pub struct Xdotool {
    helpers: Detached,
}

impl WindowControl for Xdotool {
    fn bring_to_front(&mut self, pid: u32) {
        let pid = pid.to_string();
        self.helpers
            .run("xdotool", &["search", "--pid", &pid, "windowactivate"]);
    }

    fn minimize(&mut self, pid: u32) {
        let pid = pid.to_string();
        self.helpers
            .run("xdotool", &["search", "--pid", &pid, "windowminimize"]);
    }
}

#[derive(Debug, Default)]
pub struct NoWindowControl;

impl WindowControl for NoWindowControl {
    fn bring_to_front(&mut self, _pid: u32) {}
    fn minimize(&mut self, _pid: u32) {}
}

pub fn default_window_control() -> Box<dyn WindowControl> {
    if cfg!(unix) && std::env::var_os("DISPLAY").is_some() {
        Box::new(Xdotool::default())
    } else {
        Box::new(NoWindowControl)
    }
}

/// Turns the screen off while the frontend sleeps.
pub trait PowerSave {
    fn power_save(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desktop {
    Gnome,
    Kde,
    Other,
}

impl Desktop {
    pub fn from_xdg(value: Option<&str>) -> Desktop {
        match value {
            Some(v) if v.to_uppercase().contains("GNOME") => Desktop::Gnome,
            Some(v) if v.to_uppercase().contains("KDE") => Desktop::Kde,
            _ => Desktop::Other,
        }
    }

    /// Command line that blanks the screen on this desktop.
    pub fn power_save_command(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Desktop::Gnome => Some(("busctl", GNOME_POWER_SAVE)),
            Desktop::Kde => Some(("dbus-send", KDE_POWER_SAVE)),
            Desktop::Other => None,
        }
    }
}

const GNOME_POWER_SAVE: &[&str] = &[
    "--user",
    "set-property",
    "org.gnome.Mutter.DisplayConfig",
    "/org/gnome/Mutter/DisplayConfig",
    "org.gnome.Mutter.DisplayConfig",
    "PowerSaveMode",
    "i",
    "3",
];

const KDE_POWER_SAVE: &[&str] = &[
    "--session",
    "--print-reply",
    "--dest=org.kde.kglobalaccel",
    "/component/org_kde_powerdevil",
    "org.kde.kglobalaccel.Component.invokeShortcut",
    "string:Turn Off Screen",
];

#[derive(Debug)]
pub struct DesktopPowerSave {
    desktop: Desktop,
    helpers: Detached,
}

impl DesktopPowerSave {
    pub fn from_env() -> Self {
        let xdg = std::env::var("XDG_CURRENT_DESKTOP").ok();
        DesktopPowerSave {
            desktop: Desktop::from_xdg(xdg.as_deref()),
            helpers: Detached::default(),
        }
    }
}

impl PowerSave for DesktopPowerSave {
    fn power_save(&mut self) {
        match self.desktop.power_save_command() {
            Some((program, args)) => {
                tracing::info!("Screen power save via {}", program);
                self.helpers.run(program, args);
            }
            None => tracing::debug!("No power save command for this desktop"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_detection() {
        assert_eq!(Desktop::from_xdg(Some("GNOME")), Desktop::Gnome);
        assert_eq!(Desktop::from_xdg(Some("ubuntu:GNOME")), Desktop::Gnome);
        assert_eq!(Desktop::from_xdg(Some("KDE")), Desktop::Kde);
        assert_eq!(Desktop::from_xdg(Some("XFCE")), Desktop::Other);
        assert_eq!(Desktop::from_xdg(None), Desktop::Other);
        assert!(Desktop::Other.power_save_command().is_none());
        let (program, args) = Desktop::Gnome.power_save_command().unwrap();
        assert_eq!(program, "busctl");
        assert_eq!(args.last(), Some(&"3"));
    }

    #[test]
    fn posix_plan_kills_companion_before_primary() {
        let signals: Vec<_> = POSIX_KILL_PLAN
            .iter()
            .filter_map(|s| match s {
                KillStep::Signal(t, sig) => Some((*t, *sig)),
                KillStep::Settle => None,
            })
            .collect();
        assert_eq!(
            signals,
            [
                (KillTarget::Companion, KillSignal::Graceful),
                (KillTarget::Companion, KillSignal::Forced),
                (KillTarget::Primary, KillSignal::Graceful),
                (KillTarget::Primary, KillSignal::Forced),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn spawned_process_is_tracked_until_exit() {
        let mut host = SystemProcessHost::new();
        let cmd = LaunchCommand {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
            watch_process: None,
        };
        let mut p = host.spawn(&cmd).unwrap();
        assert_eq!(p.name, "sleep");
        assert!(!host.has_exited(&mut p));
        host.signal(&mut p, KillSignal::Forced);
        let mut exited = false;
        for _ in 0..50 {
            if host.has_exited(&mut p) {
                exited = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(exited);
    }

    #[cfg(unix)]
    fn sh(script: &str) -> LaunchCommand {
        LaunchCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            watch_process: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn forced_kill_takes_down_the_whole_tree() {
        let mut host = SystemProcessHost::new();
        let mut p = host.spawn(&sh("sleep 30 & sleep 30 & wait")).unwrap();
        let root = Pid::from_u32(p.pid);
        let mut children = Vec::new();
        for _ in 0..100 {
            children = host.descendants(root);
            if children.len() >= 2 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(children.len(), 2);

        host.signal(&mut p, KillSignal::Forced);
        assert!(host.has_exited(&mut p));
        let mut all_gone = false;
        for _ in 0..100 {
            if children.iter().all(|pid| !host.is_alive(*pid)) {
                all_gone = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(all_gone);
    }

    #[cfg(unix)]
    #[test]
    fn forced_kill_reaps_a_primary_that_ignores_term() {
        let mut host = SystemProcessHost::new();
        let mut p = host.spawn(&sh("trap '' TERM; while :; do sleep 1; done")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(300));
        host.signal(&mut p, KillSignal::Graceful);
        assert!(!host.has_exited(&mut p));

        host.signal(&mut p, KillSignal::Forced);
        // reaped, so the pid is gone from the table rather than a zombie
        assert!(!host.sys.refresh_process(Pid::from_u32(p.pid)));
    }

    #[test]
    fn spawn_failure_names_program() {
        let mut host = SystemProcessHost::new();
        let cmd = LaunchCommand {
            program: "/definitely/not/an/emulator".to_string(),
            args: vec![],
            watch_process: None,
        };
        let err = host.spawn(&cmd).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/an/emulator"));
    }
}
