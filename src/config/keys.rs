use crate::foundation::error::{SlidesError, SlidesResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Raw key codes understood by the default keymap (Qt key code space).
pub mod codes {
    pub const SPACE: u32 = 0x20;
    pub const ESCAPE: u32 = 0x0100_0000;
    pub const RETURN: u32 = 0x0100_0004;
    pub const LEFT: u32 = 0x0100_0012;
    pub const UP: u32 = 0x0100_0013;
    pub const RIGHT: u32 = 0x0100_0014;
    pub const DOWN: u32 = 0x0100_0015;
    pub const PAGE_UP: u32 = 0x0100_0016;
    pub const PAGE_DOWN: u32 = 0x0100_0017;

    /// Code of a printable ASCII key (letters map to their uppercase form).
    pub const fn ascii(c: char) -> u32 {
        c.to_ascii_uppercase() as u32
    }
}

/// Resolve a key name (`"right"`, `"space"`, `"q"`, ...) into a raw key code.
pub fn key_code_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().to_ascii_lowercase();
    let code = match lower.as_str() {
        "" => return None,
        "space" | " " => codes::SPACE,
        "esc" | "escape" => codes::ESCAPE,
        "enter" | "return" => codes::RETURN,
        "left" => codes::LEFT,
        "up" => codes::UP,
        "right" => codes::RIGHT,
        "down" => codes::DOWN,
        "pageup" | "page_up" => codes::PAGE_UP,
        "pagedown" | "page_down" => codes::PAGE_DOWN,
        _ => {
            let mut chars = lower.chars();
            let c = chars.next()?;
            if chars.next().is_some() || !c.is_ascii_graphic() {
                return None;
            }
            codes::ascii(c)
        }
    };
    Some(code)
}

/// Logical presenter actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    PlayPause,
    Next,
    Previous,
    Reverse,
    Replay,
    FullScreen,
    HideMouse,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Quit,
        Action::PlayPause,
        Action::Next,
        Action::Previous,
        Action::Reverse,
        Action::Replay,
        Action::FullScreen,
        Action::HideMouse,
    ];
}

/// A set of key codes bound to one action, with an optional display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Key {
    pub fn new(ids: impl IntoIterator<Item = u32>, name: &str) -> Self {
        let ids: BTreeSet<u32> = ids.into_iter().collect();
        Self {
            ids: ids.into_iter().collect(),
            name: Some(name.to_owned()),
        }
    }

    pub fn set_ids(&mut self, ids: impl IntoIterator<Item = u32>) {
        let ids: BTreeSet<u32> = ids.into_iter().collect();
        self.ids = ids.into_iter().collect();
    }

    pub fn matches(&self, code: u32) -> bool {
        self.ids.contains(&code)
    }

    fn validate(&self, field: &str) -> SlidesResult<()> {
        if self.ids.is_empty() {
            return Err(SlidesError::validation(format!(
                "key {field}: ids must be a non-empty set"
            )));
        }
        if self.ids.contains(&0) {
            return Err(SlidesError::validation(format!(
                "key {field}: key codes must be positive"
            )));
        }
        let unique: BTreeSet<_> = self.ids.iter().collect();
        if unique.len() != self.ids.len() {
            return Err(SlidesError::validation(format!(
                "key {field}: key codes must be unique"
            )));
        }
        Ok(())
    }
}

/// The full keymap: one [`Key`] per [`Action`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keys {
    #[serde(rename = "QUIT")]
    pub quit: Key,
    #[serde(rename = "PLAY_PAUSE")]
    pub play_pause: Key,
    #[serde(rename = "NEXT")]
    pub next: Key,
    #[serde(rename = "PREVIOUS")]
    pub previous: Key,
    #[serde(rename = "REVERSE")]
    pub reverse: Key,
    #[serde(rename = "REPLAY")]
    pub replay: Key,
    #[serde(rename = "FULL_SCREEN")]
    pub full_screen: Key,
    #[serde(rename = "HIDE_MOUSE")]
    pub hide_mouse: Key,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            quit: Key::new([codes::ascii('q')], "QUIT"),
            play_pause: Key::new([codes::SPACE], "PLAY / PAUSE"),
            next: Key::new([codes::RIGHT], "NEXT"),
            previous: Key::new([codes::LEFT], "PREVIOUS"),
            reverse: Key::new([codes::ascii('v')], "REVERSE"),
            replay: Key::new([codes::ascii('r')], "REPLAY"),
            full_screen: Key::new([codes::ascii('f')], "TOGGLE FULL SCREEN"),
            hide_mouse: Key::new([codes::ascii('h')], "HIDE / SHOW MOUSE"),
        }
    }
}

impl Keys {
    pub fn key(&self, action: Action) -> &Key {
        match action {
            Action::Quit => &self.quit,
            Action::PlayPause => &self.play_pause,
            Action::Next => &self.next,
            Action::Previous => &self.previous,
            Action::Reverse => &self.reverse,
            Action::Replay => &self.replay,
            Action::FullScreen => &self.full_screen,
            Action::HideMouse => &self.hide_mouse,
        }
    }

    pub fn key_mut(&mut self, action: Action) -> &mut Key {
        match action {
            Action::Quit => &mut self.quit,
            Action::PlayPause => &mut self.play_pause,
            Action::Next => &mut self.next,
            Action::Previous => &mut self.previous,
            Action::Reverse => &mut self.reverse,
            Action::Replay => &mut self.replay,
            Action::FullScreen => &mut self.full_screen,
            Action::HideMouse => &mut self.hide_mouse,
        }
    }

    /// Check per-key invariants and that no key code is bound to two actions.
    pub fn validate(&self) -> SlidesResult<()> {
        let mut seen: HashMap<u32, Action> = HashMap::new();
        for action in Action::ALL {
            let key = self.key(action);
            key.validate(&format!("{action:?}"))?;
            for &code in &key.ids {
                if let Some(other) = seen.insert(code, action) {
                    return Err(SlidesError::validation(format!(
                        "two or more keys share a common key code ({code:#x} is bound to \
                         both {other:?} and {action:?}): please make sure each key has \
                         distinct key codes"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Union key codes per action; `other`'s name wins when present.
    pub fn merge_with(mut self, other: &Keys) -> SlidesResult<Self> {
        for action in Action::ALL {
            let theirs = other.key(action);
            let ours = self.key_mut(action);
            let union: Vec<u32> = ours.ids.iter().chain(&theirs.ids).copied().collect();
            ours.set_ids(union);
            if theirs.name.as_deref().is_some_and(|n| !n.is_empty()) {
                ours.name = theirs.name.clone();
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Build the key-code lookup table used by the event thread.
    pub fn dispatch(&self) -> KeyDispatch {
        let mut table = HashMap::new();
        for action in Action::ALL {
            for &code in &self.key(action).ids {
                table.insert(code, action);
            }
        }
        KeyDispatch { table }
    }
}

/// Key code to action lookup.
#[derive(Clone, Debug, Default)]
pub struct KeyDispatch {
    table: HashMap<u32, Action>,
}

impl KeyDispatch {
    pub fn action_for(&self, code: u32) -> Option<Action> {
        let action = self.table.get(&code).copied();
        if let Some(a) = action {
            tracing::debug!("pressed key: {a:?}");
        }
        action
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/keys.rs"]
mod tests;
