use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// The handlers the router knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Welcome,
    PermissionResult,
    FavoriteColor,
    FakeColorOffer,
    FakeColorSelection,
    NoInput,
    DeepLinkTest,
}

impl IntentKind {
    pub const ALL: [IntentKind; 7] = [
        IntentKind::Welcome,
        IntentKind::PermissionResult,
        IntentKind::FavoriteColor,
        IntentKind::FakeColorOffer,
        IntentKind::FakeColorSelection,
        IntentKind::NoInput,
        IntentKind::DeepLinkTest,
    ];

    /// Dialogflow intent display names wired to this handler out of the box.
    pub fn default_names(self) -> &'static [&'static str] {
        match self {
            Self::Welcome => &["Default Welcome Intent"],
            Self::PermissionResult => &["actions_intent_PERMISSION"],
            Self::FavoriteColor => &["favorite color"],
            Self::FakeColorOffer => &["favorite color - yes", "favorite fake color - yes"],
            Self::FakeColorSelection => &["favorite fake color"],
            Self::NoInput => &["actions_intent_NO_INPUT"],
            Self::DeepLinkTest => &["test"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::PermissionResult => "permission_result",
            Self::FavoriteColor => "favorite_color",
            Self::FakeColorOffer => "fake_color_offer",
            Self::FakeColorSelection => "fake_color_selection",
            Self::NoInput => "no_input",
            Self::DeepLinkTest => "deep_link_test",
        }
    }
}

/// Intent name to handler table. Names match case-insensitively with collapsed whitespace.
#[derive(Debug, Clone)]
pub struct IntentRegistry {
    routes: HashMap<String, IntentKind>,
}

impl IntentRegistry {
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Registers `name` for `kind`, returning the handler it replaced.
    pub fn register(&mut self, name: &str, kind: IntentKind) -> Option<IntentKind> {
        self.routes.insert(route_key(name), kind)
    }

    pub fn lookup(&self, name: &str) -> Option<IntentKind> {
        self.routes.get(&route_key(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn names_for(&self, kind: IntentKind) -> Vec<&str> {
        let mut names = self
            .routes
            .iter()
            .filter(|(_, registered)| **registered == kind)
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl Default for IntentRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in IntentKind::ALL {
            for name in kind.default_names() {
                registry.register(name, kind);
            }
        }
        registry
    }
}

fn route_key(name: &str) -> String {
    normalize_text(name).to_lowercase()
}
