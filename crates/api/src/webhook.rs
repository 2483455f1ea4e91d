//! Dialogflow v2 webhook payloads for Actions on Google clients.

use std::collections::BTreeMap;

use codecolors_core::{
    Capabilities, Capability, ConversationEvent, DisplayColor, PlatformArguments, PromptFragment,
    ResponseDirective, UserState,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const OPTION_INTENT: &str = "actions.intent.OPTION";
pub const PERMISSION_INTENT: &str = "actions.intent.PERMISSION";
const OPTION_VALUE_SPEC: &str = "type.googleapis.com/google.actions.v2.OptionValueSpec";
const PERMISSION_VALUE_SPEC: &str = "type.googleapis.com/google.actions.v2.PermissionValueSpec";

/// Spoken placeholder the platform replaces with its own permission prompt.
pub const PERMISSION_PLACEHOLDER: &str = "PLACEHOLDER_FOR_PERMISSION";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    pub query_result: QueryResult,
    #[serde(default)]
    pub original_detect_intent_request: Option<OriginalDetectIntentRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub language_code: Option<String>,
    #[serde(default)]
    pub intent: Option<IntentRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalDetectIntentRequest {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub payload: ActionsPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsPayload {
    #[serde(default)]
    pub user: Option<ActionsUser>,
    #[serde(default)]
    pub surface: Option<Surface>,
    #[serde(default)]
    pub inputs: Vec<ActionsInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsUser {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub user_storage: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Surface {
    #[serde(default)]
    pub capabilities: Vec<CapabilityRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsInput {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: String,
    #[serde(default)]
    pub text_value: Option<String>,
    /// int64 values arrive as JSON strings.
    #[serde(default)]
    pub int_value: Option<Value>,
    #[serde(default)]
    pub bool_value: Option<bool>,
}

impl Argument {
    fn as_int(&self) -> Option<u32> {
        match self.int_value.as_ref() {
            Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(raw)) => raw.trim().parse().ok(),
            _ => self
                .text_value
                .as_deref()
                .and_then(|raw| raw.trim().parse().ok()),
        }
    }

    fn as_bool(&self) -> Option<bool> {
        self.bool_value.or_else(|| {
            self.text_value
                .as_deref()
                .and_then(|raw| raw.trim().parse().ok())
        })
    }
}

/// Shape of the `userStorage` string the platform round-trips for us.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StorageEnvelope {
    #[serde(default)]
    data: StorageData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
}

pub fn decode_user_storage(raw: &str) -> UserState {
    if raw.trim().is_empty() {
        return UserState::default();
    }
    match serde_json::from_str::<StorageEnvelope>(raw) {
        Ok(envelope) => UserState {
            user_display_name: envelope.data.user_name,
        },
        Err(error) => {
            tracing::warn!(error = %error, "ignoring unreadable userStorage");
            UserState::default()
        }
    }
}

pub fn encode_user_storage(state: &UserState) -> String {
    let envelope = StorageEnvelope {
        data: StorageData {
            user_name: state.display_name().map(str::to_string),
        },
    };
    serde_json::to_string(&envelope).unwrap_or_else(|_| "{\"data\":{}}".to_string())
}

impl WebhookRequest {
    pub fn intent_name(&self) -> Option<&str> {
        self.query_result
            .intent
            .as_ref()
            .map(|intent| intent.display_name.trim())
            .filter(|name| !name.is_empty())
    }

    fn payload(&self) -> Option<&ActionsPayload> {
        self.original_detect_intent_request
            .as_ref()
            .map(|request| &request.payload)
    }

    fn user(&self) -> Option<&ActionsUser> {
        self.payload().and_then(|payload| payload.user.as_ref())
    }

    /// Raw `userStorage` as received, echoed back when nothing changes.
    pub fn user_storage(&self) -> Option<&str> {
        self.user().and_then(|user| user.user_storage.as_deref())
    }

    fn argument(&self, name: &str) -> Option<&Argument> {
        self.payload()?
            .inputs
            .iter()
            .flat_map(|input| input.arguments.iter())
            .find(|argument| argument.name == name)
    }

    pub fn into_event(self) -> ConversationEvent {
        let locale = self
            .user()
            .and_then(|user| user.locale.clone())
            .or_else(|| self.query_result.language_code.clone())
            .unwrap_or_default();

        let capabilities = self
            .payload()
            .and_then(|payload| payload.surface.as_ref())
            .map(|surface| {
                surface
                    .capabilities
                    .iter()
                    .filter_map(|capability| Capability::from_platform_name(&capability.name))
                    .collect::<Capabilities>()
            })
            .unwrap_or_default();

        let stored_state = self
            .user_storage()
            .map(decode_user_storage)
            .unwrap_or_default();

        // A REPROMPT_COUNT with no value is the zero the platform omitted.
        let arguments = PlatformArguments {
            reprompt_count: self
                .argument("REPROMPT_COUNT")
                .map(|argument| argument.as_int().unwrap_or(0)),
            is_final_reprompt: self
                .argument("IS_FINAL_REPROMPT")
                .and_then(Argument::as_bool)
                .unwrap_or(false),
            selected_option: self
                .argument("OPTION")
                .and_then(|argument| argument.text_value.clone()),
            permission_granted: self.argument("PERMISSION").and_then(Argument::as_bool),
            profile_display_name: self
                .user()
                .and_then(|user| user.profile.as_ref())
                .and_then(|profile| profile.display_name.clone()),
        };

        ConversationEvent {
            intent_name: self.intent_name().unwrap_or_default().to_string(),
            parameters: self.query_result.parameters,
            locale,
            capabilities,
            stored_state,
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsePayload {
    pub google: GoogleResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResponse {
    pub expect_user_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_storage: Option<String>,
    pub rich_response: RichResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_intent: Option<SystemIntent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RichResponse {
    pub items: Vec<RichItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RichItem {
    SimpleResponse(SimpleResponse),
    BasicCard(BasicCard),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleResponse {
    pub text_to_speech: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicCard {
    pub title: String,
    pub formatted_text: String,
    pub image: Image,
    pub image_display_options: DisplayColor,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub url: String,
    pub accessibility_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemIntent {
    pub intent: String,
    pub data: Value,
}

impl WebhookResponse {
    /// Renders a directive; `incoming_storage` is echoed unless the directive replaces it.
    pub fn from_directive(directive: &ResponseDirective, incoming_storage: Option<&str>) -> Self {
        let mut items = Vec::new();
        let mut system_intent = None;

        for fragment in &directive.prompts {
            match fragment {
                PromptFragment::PlainText { text } => {
                    items.push(RichItem::SimpleResponse(SimpleResponse {
                        text_to_speech: text.clone(),
                        display_text: None,
                    }));
                }
                PromptFragment::Speech { ssml, display_text } => {
                    items.push(RichItem::SimpleResponse(SimpleResponse {
                        text_to_speech: ssml.clone(),
                        display_text: Some(display_text.clone()),
                    }));
                }
                PromptFragment::RichCard {
                    title,
                    text,
                    image_url,
                    image_alt_text,
                    display_color,
                } => {
                    items.push(RichItem::BasicCard(BasicCard {
                        title: title.clone(),
                        formatted_text: text.clone(),
                        image: Image {
                            url: image_url.clone(),
                            accessibility_text: image_alt_text.clone(),
                        },
                        image_display_options: *display_color,
                    }));
                }
                PromptFragment::Carousel { items: options } => {
                    let options = options
                        .iter()
                        .map(|item| {
                            json!({
                                "optionInfo": {
                                    "key": item.key,
                                    "synonyms": item.synonyms,
                                },
                                "title": item.title,
                                "image": {
                                    "url": item.image_url,
                                    "accessibilityText": item.image_alt_text,
                                },
                            })
                        })
                        .collect::<Vec<_>>();
                    system_intent = Some(SystemIntent {
                        intent: OPTION_INTENT.to_string(),
                        data: json!({
                            "@type": OPTION_VALUE_SPEC,
                            "carouselSelect": { "items": options },
                        }),
                    });
                }
                PromptFragment::PermissionRequest {
                    context,
                    permissions,
                } => {
                    items.push(RichItem::SimpleResponse(SimpleResponse {
                        text_to_speech: PERMISSION_PLACEHOLDER.to_string(),
                        display_text: None,
                    }));
                    let permissions = permissions
                        .iter()
                        .map(|permission| permission.as_code())
                        .collect::<Vec<_>>();
                    system_intent = Some(SystemIntent {
                        intent: PERMISSION_INTENT.to_string(),
                        data: json!({
                            "@type": PERMISSION_VALUE_SPEC,
                            "optContext": context,
                            "permissions": permissions,
                        }),
                    });
                }
            }
        }

        let user_storage = match &directive.updated_state {
            Some(state) => Some(encode_user_storage(state)),
            None => incoming_storage.map(str::to_string),
        };

        Self {
            payload: ResponsePayload {
                google: GoogleResponse {
                    expect_user_response: !directive.terminal,
                    user_storage,
                    rich_response: RichResponse {
                        items,
                        suggestions: directive
                            .suggestions
                            .iter()
                            .map(|title| Suggestion {
                                title: title.clone(),
                            })
                            .collect(),
                    },
                    system_intent,
                },
            },
        }
    }
}
