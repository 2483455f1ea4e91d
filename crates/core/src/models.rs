use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ScreenOutput,
    AudioOutput,
    MediaResponseAudio,
    WebBrowser,
}

impl Capability {
    pub fn from_platform_name(value: &str) -> Option<Self> {
        match value.trim() {
            "actions.capability.SCREEN_OUTPUT" => Some(Self::ScreenOutput),
            "actions.capability.AUDIO_OUTPUT" => Some(Self::AudioOutput),
            "actions.capability.MEDIA_RESPONSE_AUDIO" => Some(Self::MediaResponseAudio),
            "actions.capability.WEB_BROWSER" => Some(Self::WebBrowser),
            _ => None,
        }
    }
}

/// Surface capabilities the client declared for this request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn has_screen(&self) -> bool {
        self.contains(Capability::ScreenOutput)
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The single user-scoped storage slot the host platform keeps across turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_display_name: Option<String>,
}

impl UserState {
    pub fn with_display_name(name: impl Into<String>) -> Self {
        Self {
            user_display_name: Some(name.into()),
        }
    }

    /// Stored name, ignoring blank values.
    pub fn display_name(&self) -> Option<&str> {
        self.user_display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.display_name().is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformArguments {
    #[serde(default)]
    pub reprompt_count: Option<u32>,
    #[serde(default)]
    pub is_final_reprompt: bool,
    #[serde(default)]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub permission_granted: Option<bool>,
    #[serde(default)]
    pub profile_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub intent_name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub stored_state: UserState,
    #[serde(default)]
    pub arguments: PlatformArguments,
}

impl ConversationEvent {
    pub fn new(intent_name: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            parameters: BTreeMap::new(),
            locale: String::new(),
            capabilities: Capabilities::default(),
            stored_state: UserState::default(),
            arguments: PlatformArguments::default(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_screen(self) -> Self {
        self.with_capability(Capability::ScreenOutput)
    }

    pub fn with_state(mut self, state: UserState) -> Self {
        self.stored_state = state;
        self
    }

    pub fn with_arguments(mut self, arguments: PlatformArguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// String parameter value, trimmed. Numbers are rendered; blanks count as absent.
    pub fn parameter_text(&self, name: &str) -> Option<String> {
        let text = match self.parameters.get(name)? {
            Value::String(value) => value.trim().to_string(),
            Value::Number(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserPermission {
    Name,
}

impl UserPermission {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Name => "NAME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselItem {
    pub key: String,
    pub title: String,
    pub synonyms: Vec<String>,
    pub image_url: String,
    pub image_alt_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptFragment {
    PlainText {
        text: String,
    },
    /// SSML markup plus the same sentence without markup for screens.
    Speech {
        ssml: String,
        display_text: String,
    },
    RichCard {
        title: String,
        text: String,
        image_url: String,
        image_alt_text: String,
        display_color: crate::catalog::DisplayColor,
    },
    Carousel {
        items: Vec<CarouselItem>,
    },
    PermissionRequest {
        context: String,
        permissions: Vec<UserPermission>,
    },
}

impl PromptFragment {
    pub fn text(value: impl Into<String>) -> Self {
        Self::PlainText { text: value.into() }
    }

    pub fn is_visual(&self) -> bool {
        matches!(self, Self::RichCard { .. } | Self::Carousel { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDirective {
    pub prompts: Vec<PromptFragment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub terminal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_state: Option<UserState>,
}

impl ResponseDirective {
    pub fn ask(prompts: Vec<PromptFragment>) -> Self {
        Self {
            prompts,
            ..Self::default()
        }
    }

    pub fn close(prompts: Vec<PromptFragment>) -> Self {
        Self {
            prompts,
            terminal: true,
            ..Self::default()
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_state(mut self, state: UserState) -> Self {
        self.updated_state = Some(state);
        self
    }

    /// Concatenated spoken/plain text of every textual fragment, for logs and the CLI.
    pub fn transcript(&self) -> String {
        self.prompts
            .iter()
            .filter_map(|fragment| match fragment {
                PromptFragment::PlainText { text } => Some(text.as_str()),
                PromptFragment::Speech { display_text, .. } => Some(display_text.as_str()),
                PromptFragment::RichCard { title, .. } => Some(title.as_str()),
                PromptFragment::PermissionRequest { context, .. } => Some(context.as_str()),
                PromptFragment::Carousel { .. } => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
