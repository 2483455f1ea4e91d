use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::FulfillmentError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[sd%]").expect("valid placeholder regex"));

/// Every template key a handler can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    DeepLinkAck,
    PermissionContext,
    GreetingAgain,
    PermissionDenied,
    PermissionGranted,
    LuckyNumberNamed,
    LuckyNumber,
    FakeColorOffer,
    FakeColorIntro,
    FakeColorFollowUp,
    NoInputFirst,
    NoInputSecond,
    NoInputFinal,
    DidNotUnderstand,
}

impl MessageKey {
    pub const ALL: [MessageKey; 14] = [
        MessageKey::DeepLinkAck,
        MessageKey::PermissionContext,
        MessageKey::GreetingAgain,
        MessageKey::PermissionDenied,
        MessageKey::PermissionGranted,
        MessageKey::LuckyNumberNamed,
        MessageKey::LuckyNumber,
        MessageKey::FakeColorOffer,
        MessageKey::FakeColorIntro,
        MessageKey::FakeColorFollowUp,
        MessageKey::NoInputFirst,
        MessageKey::NoInputSecond,
        MessageKey::NoInputFinal,
        MessageKey::DidNotUnderstand,
    ];

    /// Dotted path of the key inside a bundle file.
    pub fn path(self) -> &'static str {
        match self {
            Self::DeepLinkAck => "deep_link.ack",
            Self::PermissionContext => "welcome.permission_context",
            Self::GreetingAgain => "welcome.greeting_again",
            Self::PermissionDenied => "permission.denied",
            Self::PermissionGranted => "permission.granted",
            Self::LuckyNumberNamed => "favorite_color.lucky_number_named",
            Self::LuckyNumber => "favorite_color.lucky_number",
            Self::FakeColorOffer => "fake_color.offer",
            Self::FakeColorIntro => "fake_color.intro",
            Self::FakeColorFollowUp => "fake_color.follow_up",
            Self::NoInputFirst => "no_input.first",
            Self::NoInputSecond => "no_input.second",
            Self::NoInputFinal => "no_input.final",
            Self::DidNotUnderstand => "fallback.did_not_understand",
        }
    }
}

/// Read access to loaded locale bundles. Tags are canonical (lowercase, `-`).
pub trait MessageSource: Send + Sync {
    fn locales(&self) -> Vec<String>;
    fn template(&self, locale: &str, key: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateArg {
    Text(String),
    Number(i64),
}

impl From<&str> for TemplateArg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TemplateArg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<usize> for TemplateArg {
    fn from(value: usize) -> Self {
        Self::Number(value as i64)
    }
}

impl TemplateArg {
    fn render(&self, numeric: bool, ssml: bool) -> String {
        match (self, numeric) {
            (Self::Number(value), _) => value.to_string(),
            (Self::Text(value), true) => value
                .trim()
                .parse::<f64>()
                .map(|number| (number.trunc() as i64).to_string())
                .unwrap_or_else(|_| "NaN".to_string()),
            (Self::Text(value), false) if ssml => escape_ssml(value),
            (Self::Text(value), false) => value.clone(),
        }
    }
}

/// Escapes text spliced into SSML markup.
pub fn escape_ssml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Inverse of [`escape_ssml`]; `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn unescape_ssml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Fills `%s` and `%d` placeholders left to right; `%%` is a literal percent sign.
/// Placeholders without a matching argument are left untouched.
pub fn format_template(template: &str, args: &[TemplateArg]) -> String {
    fill(template, args, false)
}

/// [`format_template`] for SSML templates: text arguments are XML-escaped.
pub fn format_ssml_template(template: &str, args: &[TemplateArg]) -> String {
    fill(template, args, true)
}

fn fill(template: &str, args: &[TemplateArg], ssml: bool) -> String {
    let mut next = 0usize;
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let token = &caps[0];
            if token == "%%" {
                return "%".to_string();
            }
            let Some(arg) = args.get(next) else {
                return token.to_string();
            };
            next += 1;
            arg.render(token == "%d", ssml)
        })
        .into_owned()
}

/// Number of `%s`/`%d` placeholders, ignoring `%%`.
pub fn placeholder_count(template: &str) -> usize {
    PLACEHOLDER
        .find_iter(template)
        .filter(|found| found.as_str() != "%%")
        .count()
}

/// Template lookups bound to one resolved locale, falling back to the default bundle.
#[derive(Clone, Copy)]
pub struct Messages<'a> {
    source: &'a dyn MessageSource,
    locale: &'a str,
    default_locale: &'a str,
}

impl<'a> Messages<'a> {
    pub fn new(source: &'a dyn MessageSource, locale: &'a str, default_locale: &'a str) -> Self {
        Self {
            source,
            locale,
            default_locale,
        }
    }

    pub fn raw(&self, key: MessageKey) -> Result<&'a str, FulfillmentError> {
        [self.locale, self.default_locale]
            .into_iter()
            .find_map(|locale| {
                self.source
                    .template(locale, key.path())
                    .filter(|template| !template.trim().is_empty())
            })
            .ok_or_else(|| FulfillmentError::MissingTemplate {
                locale: self.locale.to_string(),
                key: key.path(),
            })
    }

    pub fn text(&self, key: MessageKey, args: &[TemplateArg]) -> Result<String, FulfillmentError> {
        Ok(format_template(self.raw(key)?, args))
    }

    pub fn ssml(&self, key: MessageKey, args: &[TemplateArg]) -> Result<String, FulfillmentError> {
        Ok(format_ssml_template(self.raw(key)?, args))
    }
}
