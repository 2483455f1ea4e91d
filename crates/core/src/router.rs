use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::catalog::{FakeColorCatalog, FAKE_COLOR_CATALOG};
use crate::error::FulfillmentError;
use crate::intent::{normalize_text, IntentKind, IntentRegistry};
use crate::locale::{LocaleResolver, ResolvedLocale};
use crate::models::{
    ConversationEvent, PromptFragment, ResponseDirective, UserPermission, UserState,
};
use crate::templates::{unescape_ssml, MessageKey, MessageSource, Messages};

pub const LUCKY_NUMBER_SOUND_URL: &str =
    "https://actions.google.com/sounds/v1/cartoon/clang_and_wobble.ogg";

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedTurn {
    pub intent: IntentKind,
    pub locale: ResolvedLocale,
    pub directive: ResponseDirective,
    /// A required parameter was missing or unknown and the generic prompt was sent.
    pub fail_closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Handled(RoutedTurn),
    /// No handler is registered; the host's own fallback applies.
    Unhandled,
}

impl RouteOutcome {
    pub fn directive(&self) -> Option<&ResponseDirective> {
        match self {
            Self::Handled(turn) => Some(&turn.directive),
            Self::Unhandled => None,
        }
    }
}

struct Reply {
    directive: ResponseDirective,
    fail_closed: bool,
}

impl From<ResponseDirective> for Reply {
    fn from(directive: ResponseDirective) -> Self {
        Self {
            directive,
            fail_closed: false,
        }
    }
}

/// Pure mapping from a conversation event to the next response.
///
/// All inputs arrive on the event (including the stored user state) and every
/// state change leaves on the directive, so routing the same event twice gives
/// the same answer.
#[derive(Clone)]
pub struct IntentRouter {
    registry: IntentRegistry,
    resolver: LocaleResolver,
    messages: Arc<dyn MessageSource>,
    catalog: &'static FakeColorCatalog,
}

impl IntentRouter {
    pub fn new(
        registry: IntentRegistry,
        resolver: LocaleResolver,
        messages: Arc<dyn MessageSource>,
    ) -> Self {
        Self {
            registry,
            resolver,
            messages,
            catalog: &FAKE_COLOR_CATALOG,
        }
    }

    pub fn registry(&self) -> &IntentRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &LocaleResolver {
        &self.resolver
    }

    pub fn route(&self, event: &ConversationEvent) -> Result<RouteOutcome, FulfillmentError> {
        let Some(intent) = self.registry.lookup(&event.intent_name) else {
            return Ok(RouteOutcome::Unhandled);
        };

        let locale = self.resolver.resolve(&event.locale);
        let messages = Messages::new(
            self.messages.as_ref(),
            &locale.tag,
            self.resolver.default_locale(),
        );

        let reply = match intent {
            IntentKind::Welcome => welcome(event, &messages)?,
            IntentKind::PermissionResult => permission_result(event, &messages)?,
            IntentKind::FavoriteColor => favorite_color(event, &messages)?,
            IntentKind::FakeColorOffer => self.fake_color_offer(event, &messages)?,
            IntentKind::FakeColorSelection => self.fake_color_selection(event, &messages)?,
            IntentKind::NoInput => no_input(event, &messages)?,
            IntentKind::DeepLinkTest => Reply::from(ResponseDirective::close(vec![text(
                &messages,
                MessageKey::DeepLinkAck,
            )?])),
        };

        Ok(RouteOutcome::Handled(RoutedTurn {
            intent,
            locale,
            directive: reply.directive,
            fail_closed: reply.fail_closed,
        }))
    }

    fn fake_color_offer(
        &self,
        event: &ConversationEvent,
        messages: &Messages<'_>,
    ) -> Result<Reply, FulfillmentError> {
        let mut prompts = vec![text(messages, MessageKey::FakeColorOffer)?];
        if event.capabilities.has_screen() {
            prompts.push(self.catalog.carousel());
        }
        Ok(ResponseDirective::ask(prompts).into())
    }

    fn fake_color_selection(
        &self,
        event: &ConversationEvent,
        messages: &Messages<'_>,
    ) -> Result<Reply, FulfillmentError> {
        // A tapped carousel option wins over the spoken parameter.
        let requested = event
            .arguments
            .selected_option
            .as_deref()
            .map(normalize_text)
            .filter(|option| !option.is_empty())
            .or_else(|| event.parameter_text("fakeColor"));
        let Some(entry) = requested.as_deref().and_then(|key| self.catalog.get(key)) else {
            return did_not_understand(messages);
        };

        let follow_up = text(messages, MessageKey::FakeColorFollowUp)?;
        let directive = if event.capabilities.has_screen() {
            ResponseDirective::ask(vec![
                text(messages, MessageKey::FakeColorIntro)?,
                entry.card(),
                follow_up,
            ])
            .with_suggestions(self.catalog.other_titles(entry.key))
        } else {
            ResponseDirective::ask(vec![PromptFragment::text(entry.text), follow_up])
        };
        Ok(directive.into())
    }
}

fn welcome(event: &ConversationEvent, messages: &Messages<'_>) -> Result<Reply, FulfillmentError> {
    let Some(name) = event.stored_state.display_name() else {
        let context = messages.text(MessageKey::PermissionContext, &[])?;
        return Ok(ResponseDirective::ask(vec![PromptFragment::PermissionRequest {
            context,
            permissions: vec![UserPermission::Name],
        }])
        .into());
    };

    let first_name = name.split_whitespace().next().unwrap_or(name);
    let greeting = messages.text(MessageKey::GreetingAgain, &[first_name.into()])?;
    Ok(ResponseDirective::ask(vec![PromptFragment::text(greeting)]).into())
}

fn permission_result(
    event: &ConversationEvent,
    messages: &Messages<'_>,
) -> Result<Reply, FulfillmentError> {
    let granted_name = event
        .arguments
        .profile_display_name
        .as_deref()
        .map(normalize_text)
        .filter(|name| !name.is_empty());

    match (event.arguments.permission_granted, granted_name) {
        (Some(true), Some(name)) => {
            let thanks = messages.text(MessageKey::PermissionGranted, &[name.as_str().into()])?;
            Ok(ResponseDirective::ask(vec![PromptFragment::text(thanks)])
                .with_state(UserState::with_display_name(name))
                .into())
        }
        _ => Ok(ResponseDirective::ask(vec![text(messages, MessageKey::PermissionDenied)?]).into()),
    }
}

fn favorite_color(
    event: &ConversationEvent,
    messages: &Messages<'_>,
) -> Result<Reply, FulfillmentError> {
    let Some(color) = event.parameter_text("color") else {
        return did_not_understand(messages);
    };

    let lucky_number = color.graphemes(true).count();
    let ssml = match event.stored_state.display_name() {
        Some(name) => messages.ssml(
            MessageKey::LuckyNumberNamed,
            &[name.into(), lucky_number.into(), LUCKY_NUMBER_SOUND_URL.into()],
        )?,
        None => messages.ssml(
            MessageKey::LuckyNumber,
            &[lucky_number.into(), LUCKY_NUMBER_SOUND_URL.into()],
        )?,
    };

    Ok(ResponseDirective::ask(vec![speech(ssml)]).into())
}

fn no_input(event: &ConversationEvent, messages: &Messages<'_>) -> Result<Reply, FulfillmentError> {
    let arguments = &event.arguments;
    let key = match (arguments.reprompt_count, arguments.is_final_reprompt) {
        (Some(0), _) | (None, false) => MessageKey::NoInputFirst,
        (Some(1), _) => MessageKey::NoInputSecond,
        _ => {
            return Ok(
                ResponseDirective::close(vec![text(messages, MessageKey::NoInputFinal)?]).into(),
            )
        }
    };
    Ok(ResponseDirective::ask(vec![text(messages, key)?]).into())
}

fn did_not_understand(messages: &Messages<'_>) -> Result<Reply, FulfillmentError> {
    Ok(Reply {
        directive: ResponseDirective::ask(vec![text(messages, MessageKey::DidNotUnderstand)?]),
        fail_closed: true,
    })
}

fn text(messages: &Messages<'_>, key: MessageKey) -> Result<PromptFragment, FulfillmentError> {
    Ok(PromptFragment::text(messages.text(key, &[])?))
}

/// `ssml` must carry escaped text; only real tags are stripped for the display text.
fn speech(ssml: String) -> PromptFragment {
    let display_text = normalize_text(&unescape_ssml(&MARKUP.replace_all(&ssml, " ")));
    let ssml = if ssml.trim_start().starts_with("<speak>") {
        ssml
    } else {
        format!("<speak>{ssml}</speak>")
    };
    PromptFragment::Speech { ssml, display_text }
}
