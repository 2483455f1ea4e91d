pub mod catalog;
pub mod error;
pub mod intent;
pub mod locale;
pub mod models;
pub mod router;
pub mod templates;

pub use catalog::{DisplayColor, FakeColor, FakeColorCatalog, FAKE_COLOR_CATALOG};
pub use error::{FulfillmentError, LocaleError};
pub use intent::{normalize_text, IntentKind, IntentRegistry};
pub use locale::{canonical_tag, LocaleConfig, LocaleResolver, ResolvedLocale};
pub use models::*;
pub use router::{IntentRouter, RouteOutcome, RoutedTurn, LUCKY_NUMBER_SOUND_URL};
pub use templates::{
    escape_ssml, format_ssml_template, format_template, placeholder_count, unescape_ssml,
    MessageKey, MessageSource, Messages, TemplateArg,
};
