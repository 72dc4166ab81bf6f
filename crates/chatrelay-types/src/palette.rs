//! Conversation contexts and their colour palettes.
//!
//! The palette is a plain value computed from a [`ChatContext`] and handed to
//! whatever renders the widget; nothing reads it from shared state.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// The topic a conversation is scoped to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    AsRefStr,
    IntoStaticStr,
    EnumString,
)]
pub enum ChatContext {
    #[default]
    Onboarding,
    Campaign,
    /// Anything that is not a known context.
    General,
}

impl ChatContext {
    /// Contexts offered in the context selector.
    pub const SELECTABLE: [ChatContext; 2] = [ChatContext::Onboarding, ChatContext::Campaign];

    /// Look up a context by name; unknown names map to [`ChatContext::General`].
    pub fn from_name(name: &str) -> Self {
        name.trim().parse().unwrap_or(ChatContext::General)
    }

    pub fn palette(self) -> Palette {
        Palette::for_context(self)
    }
}

/// CSS utility classes used to colour the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub text: &'static str,
    pub bg: &'static str,
    pub border: &'static str,
    pub hover_bg: &'static str,
}

impl Palette {
    pub const fn for_context(ctx: ChatContext) -> Self {
        match ctx {
            ChatContext::Onboarding => Palette {
                text: "text-purple-600",
                bg: "bg-purple-100",
                border: "border-purple-500",
                hover_bg: "hover:bg-purple-50",
            },
            ChatContext::Campaign => Palette {
                text: "text-yellow-600",
                bg: "bg-yellow-100",
                border: "border-yellow-500",
                hover_bg: "hover:bg-yellow-50",
            },
            ChatContext::General => Palette {
                text: "text-gray-600",
                bg: "bg-gray-100",
                border: "border-gray-500",
                hover_bg: "hover:bg-gray-50",
            },
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::for_context(ChatContext::default())
    }
}
