use thiserror::Error;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("template `{key}` is missing for locale `{locale}` and for the default locale")]
    MissingTemplate { locale: String, key: &'static str },
}

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("default locale `{default}` has no bundle (loaded: {available:?})")]
    DefaultUnavailable {
        default: String,
        available: Vec<String>,
    },
    #[error("locale fallback `{from}` -> `{to}` is not a valid tag pair")]
    InvalidFallback { from: String, to: String },
}
