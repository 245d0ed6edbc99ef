//! Transport-agnostic interaction contract.
//!
//! A transport (terminal, chat gateway adapter, test harness) turns operator
//! actions into [`Interaction`]s and renders the [`Reply`] it gets back. Every
//! reply is private to the operator who triggered it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::{Currency, Operation};

/// Identifies one operator session (the originating interaction context).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        SessionKey(key.into())
    }

    /// A fresh random key.
    pub fn generate() -> Self {
        SessionKey(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The person acting through the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<u64>,
    /// Carries the platform administrator permission.
    #[serde(default)]
    pub administrator: bool,
}

impl Operator {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: Vec::new(),
            administrator: false,
        }
    }

    pub fn admin(id: u64, name: impl Into<String>) -> Self {
        Self {
            administrator: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_role(mut self, role: u64) -> Self {
        self.roles.push(role);
        self
    }

    /// Chat mention; falls back to the plain name for unregistered operators.
    pub fn mention(&self) -> String {
        if self.id == 0 {
            self.name.clone()
        } else {
            format!("<@{}>", self.id)
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    /// Top-level entry point; starts a fresh session.
    Manage,
    Search(String),
    ClearSearch,
    NextPage,
    PrevPage,
    /// Choose a player by identifier (the select option value).
    Select(String),
    Refresh,
    /// Open the amount prompt for one of the four mutation affordances.
    Begin(Currency, Operation),
    SubmitAmount(String),
    Confirm,
    Cancel,
    /// Return from the detail view to the list.
    Back,
}

impl InteractionKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            InteractionKind::Manage => "manage",
            InteractionKind::Search(_) => "search",
            InteractionKind::ClearSearch => "clear_search",
            InteractionKind::NextPage => "next_page",
            InteractionKind::PrevPage => "prev_page",
            InteractionKind::Select(_) => "select",
            InteractionKind::Refresh => "refresh",
            InteractionKind::Begin(..) => "begin",
            InteractionKind::SubmitAmount(_) => "submit_amount",
            InteractionKind::Confirm => "confirm",
            InteractionKind::Cancel => "cancel",
            InteractionKind::Back => "back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub key: SessionKey,
    pub operator: Operator,
    /// Guild the interaction came from, when the platform has one.
    pub guild_id: Option<u64>,
    pub kind: InteractionKind,
}

impl Interaction {
    pub fn new(key: SessionKey, operator: Operator, kind: InteractionKind) -> Self {
        Self {
            key,
            operator,
            guild_id: None,
            kind,
        }
    }

    pub fn in_guild(mut self, guild_id: u64) -> Self {
        self.guild_id = Some(guild_id);
        self
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub emoji: Option<&'static str>,
    pub style: ButtonStyle,
    pub disabled: bool,
    /// What pressing the button sends back. `None` for read-only indicators.
    pub action: Option<InteractionKind>,
}

impl Button {
    pub fn new(label: impl Into<String>, style: ButtonStyle, action: InteractionKind) -> Self {
        Self {
            label: label.into(),
            emoji: None,
            style,
            disabled: false,
            action: Some(action),
        }
    }

    /// A disabled, action-less label (e.g. "Page 1/3").
    pub fn indicator(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            emoji: None,
            style: ButtonStyle::Secondary,
            disabled: true,
            action: None,
        }
    }

    pub fn with_emoji(mut self, emoji: &'static str) -> Self {
        self.emoji = Some(emoji);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub description: String,
    /// Player identifier sent back in [`InteractionKind::Select`].
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Button(Button),
    Select {
        placeholder: String,
        options: Vec<SelectOption>,
    },
    TextInput {
        label: String,
        placeholder: String,
        max_length: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    /// RGB color.
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub embed: Option<Embed>,
    pub components: Vec<Component>,
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embed: None,
            components: Vec::new(),
            ephemeral: true,
        }
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Reply::text(format!("❌ {}", message.as_ref()))
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }

    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }

    /// Options of the first select menu, if any.
    pub fn select_options(&self) -> &[SelectOption] {
        self.components
            .iter()
            .find_map(|c| match c {
                Component::Select { options, .. } => Some(options.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Buttons that can currently be pressed.
    pub fn enabled_actions(&self) -> Vec<&InteractionKind> {
        self.components
            .iter()
            .filter_map(|c| match c {
                Component::Button(b) if !b.disabled => b.action.as_ref(),
                _ => None,
            })
            .collect()
    }

    pub fn has_action(&self, kind: &InteractionKind) -> bool {
        self.enabled_actions().into_iter().any(|a| a == kind)
    }
}
