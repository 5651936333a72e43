/// Navigation layer: swipe gestures, keyboard chords and the on-screen keys
///
/// Interpreters here only classify input. The multiplexer turns the result
/// into focus changes or channel input.
use crate::registry::Direction;

// ============================================================================
// Gestures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct TouchStart {
    x: f64,
    y: f64,
}

/// Tracks a single touch and classifies horizontal swipes
#[derive(Debug, Clone)]
pub struct GestureTracker {
    start: Option<TouchStart>,
    swiping: bool,
    classify_distance: f64,
    commit_distance: f64,
}

impl GestureTracker {
    pub fn new(classify_distance: f64, commit_distance: f64) -> Self {
        Self {
            start: None,
            swiping: false,
            classify_distance,
            commit_distance,
        }
    }

    pub fn touch_start(&mut self, x: f64, y: f64) {
        self.start = Some(TouchStart { x, y });
        self.swiping = false;
    }

    pub fn touch_move(&mut self, x: f64, y: f64) {
        let Some(start) = self.start else {
            return;
        };
        let dx = x - start.x;
        let dy = y - start.y;
        if dx.abs() > dy.abs() && dx.abs() > self.classify_distance {
            self.swiping = true;
        }
    }

    /// Finish the touch. A rightward swipe means the previous tab, leftward
    /// the next one.
    pub fn touch_end(&mut self, x: f64) -> Option<Direction> {
        let start = self.start.take();
        let swiping = std::mem::replace(&mut self.swiping, false);
        if !swiping {
            return None;
        }

        let dx = x - start?.x;
        if dx.abs() <= self.commit_distance {
            return None;
        }
        if dx > 0.0 {
            Some(Direction::Previous)
        } else {
            Some(Direction::Next)
        }
    }
}

// ============================================================================
// Keyboard
// ============================================================================

/// A keydown as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    CycleTab(Direction),
    ToggleCommandPalette,
    CloseOverlays,
}

impl KeyCommand {
    /// Whether the browser's own handling of the chord must be suppressed
    pub fn prevents_default(&self) -> bool {
        !matches!(self, KeyCommand::CloseOverlays)
    }
}

/// Map a keydown to a command. Unbound chords fall through to the terminal.
pub fn interpret_key(chord: &KeyChord) -> Option<KeyCommand> {
    if (chord.ctrl || chord.meta) && chord.key.eq_ignore_ascii_case("k") {
        return Some(KeyCommand::ToggleCommandPalette);
    }
    if chord.key == "Escape" {
        return Some(KeyCommand::CloseOverlays);
    }
    if chord.ctrl && chord.key == "Tab" {
        let direction = if chord.shift {
            Direction::Previous
        } else {
            Direction::Next
        };
        return Some(KeyCommand::CycleTab(direction));
    }
    None
}

/// Open/closed state of the overlays that float above the terminals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overlays {
    pub command_palette: bool,
    pub new_session: bool,
}

impl Overlays {
    pub fn any_open(&self) -> bool {
        self.command_palette || self.new_session
    }

    /// Escape closes every overlay; it never touches tabs
    pub fn close_all(&mut self) -> bool {
        let changed = self.any_open();
        *self = Overlays::default();
        changed
    }
}

// ============================================================================
// Virtual keyboard
// ============================================================================

/// Keys offered by the on-screen keyboard on touch devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualKey {
    Tab,
    Escape,
    Control,
    ArrowUp,
    ArrowDown,
    ArrowRight,
    ArrowLeft,
}

impl VirtualKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Tab" => Some(VirtualKey::Tab),
            "Escape" => Some(VirtualKey::Escape),
            "Control" => Some(VirtualKey::Control),
            "ArrowUp" => Some(VirtualKey::ArrowUp),
            "ArrowDown" => Some(VirtualKey::ArrowDown),
            "ArrowRight" => Some(VirtualKey::ArrowRight),
            "ArrowLeft" => Some(VirtualKey::ArrowLeft),
            _ => None,
        }
    }

    /// Control sequence sent to the process. `Control` is a modifier and
    /// produces nothing on its own.
    pub fn sequence(&self) -> Option<&'static str> {
        match self {
            VirtualKey::Tab => Some("\t"),
            VirtualKey::Escape => Some("\x1b"),
            VirtualKey::Control => None,
            VirtualKey::ArrowUp => Some("\x1b[A"),
            VirtualKey::ArrowDown => Some("\x1b[B"),
            VirtualKey::ArrowRight => Some("\x1b[C"),
            VirtualKey::ArrowLeft => Some("\x1b[D"),
        }
    }
}
