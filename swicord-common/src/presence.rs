//! Presence configuration model.
//!
//! This is the caller-owned description of what the presence should show.
//! Empty strings mean "not set" everywhere, so values coming straight from
//! text fields or environment variables need no cleanup.

use serde::{Deserialize, Serialize};

/// Two activity slots and two link buttons.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub primary: ActivitySlot,
    pub secondary: ActivitySlot,
    pub button1: ButtonSlot,
    pub button2: ButtonSlot,
}

impl PresenceConfig {
    /// Activity slots in display order.
    pub fn activities(&self) -> [&ActivitySlot; 2] {
        [&self.primary, &self.secondary]
    }

    /// Buttons that have both a label and a URL, in order.
    pub fn complete_buttons(&self) -> impl Iterator<Item = &ButtonSlot> {
        [&self.button1, &self.button2]
            .into_iter()
            .filter(|b| b.is_complete())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySlot {
    /// Game or app name. The slot is skipped when empty.
    pub name: String,
    pub details: Option<String>,
    pub state: Option<String>,
}

impl ActivitySlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn is_set(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn details(&self) -> Option<&str> {
        non_empty(self.details.as_deref())
    }

    pub fn state(&self) -> Option<&str> {
        non_empty(self.state.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSlot {
    pub label: String,
    pub url: String,
}

impl ButtonSlot {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.label.is_empty() && !self.url.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
