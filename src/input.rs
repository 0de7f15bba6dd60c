use crate::settings::Settings;

/// Abstract frontend actions that keys and pad buttons are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Exit,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::Select,
        Action::Back,
        Action::Exit,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadButton {
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    South,
    East,
    West,
    North,
    Start,
    Back,
    LeftStick,
    RightStick,
    LeftShoulder,
    RightShoulder,
    Other,
}

/// Raw events as delivered by the windowing layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    /// Key press, named like the settings bindings ("Up", "LeftCtrl", "A").
    Key(String),
    PadDown(PadButton),
    PadUp(PadButton),
    /// Stick, trigger or pointer motion.
    Motion,
}

/// Result of routing one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Not bound to anything; idle timers are left alone.
    Ignored,
    /// User activity without an action of its own.
    Activity,
    Action(Action),
    /// Force-kill chord completed while a game runs.
    ForceKill,
}

/// Key name bindings for each action, fixed at startup.
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: Vec<(Action, String)>,
}

impl KeyMap {
    pub fn from_settings(settings: &Settings) -> Self {
        let key = |a: Action| -> String {
            match a {
                Action::Up => settings.up_key.clone(),
                Action::Down => settings.down_key.clone(),
                Action::Left => settings.left_key.clone(),
                Action::Right => settings.right_key.clone(),
                Action::Select => settings.enter_key.clone(),
                Action::Back => settings.back_key.clone(),
                Action::Exit => settings.exit_key.clone(),
            }
        };
        KeyMap {
            bindings: Action::ALL.iter().map(|&a| (a, key(a))).collect(),
        }
    }

    /// First action bound to `key`, compared case-insensitively.
    pub fn action_for(&self, key: &str) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(_, k)| !k.is_empty() && k.eq_ignore_ascii_case(key))
            .map(|(a, _)| *a)
    }
}

fn pad_action(button: PadButton) -> Option<Action> {
    match button {
        PadButton::DPadUp => Some(Action::Up),
        PadButton::DPadDown => Some(Action::Down),
        PadButton::DPadLeft => Some(Action::Left),
        PadButton::DPadRight => Some(Action::Right),
        PadButton::South => Some(Action::Select),
        PadButton::East => Some(Action::Back),
        _ => None,
    }
}

/// Maps raw events to actions, honouring only the kill chord while a game runs.
#[derive(Debug, Clone)]
pub struct InputRouter {
    keymap: KeyMap,
    /// left stick held during a game
    chord_armed: bool,
}

impl InputRouter {
    pub fn new(keymap: KeyMap) -> Self {
        InputRouter {
            keymap,
            chord_armed: false,
        }
    }

    pub fn route(&mut self, input: &RawInput, in_game: bool) -> Routed {
        if in_game {
            return self.route_in_game(input);
        }
        self.chord_armed = false;
        match input {
            RawInput::Key(name) => match self.keymap.action_for(name) {
                Some(a) => Routed::Action(a),
                None => Routed::Ignored,
            },
            RawInput::PadDown(b) => match pad_action(*b) {
                Some(a) => Routed::Action(a),
                None => Routed::Activity,
            },
            RawInput::PadUp(_) => Routed::Ignored,
            RawInput::Motion => Routed::Activity,
        }
    }

    fn route_in_game(&mut self, input: &RawInput) -> Routed {
        match input {
            RawInput::PadDown(PadButton::LeftStick) => {
                self.chord_armed = true;
                Routed::Ignored
            }
            RawInput::PadUp(PadButton::LeftStick) => {
                self.chord_armed = false;
                Routed::Ignored
            }
            RawInput::PadDown(PadButton::RightStick) if self.chord_armed => Routed::ForceKill,
            _ => Routed::Ignored,
        }
    }
}
