use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::LocaleError;

/// Lowercase tag with `_` separators folded to `-`.
pub fn canonical_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}

/// Fallback table and default locale, loaded once at startup.
///
/// Fallback keys are exact tags (`es-mx`) or language wildcards (`es-*`).
/// Exact keys win over wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_locale_tag")]
    pub default_locale: String,
    #[serde(default)]
    pub fallbacks: BTreeMap<String, String>,
}

fn default_locale_tag() -> String {
    "en".to_string()
}

impl Default for LocaleConfig {
    fn default() -> Self {
        let fallbacks = ["es-419", "es-ES", "es-MX", "es-US", "es-PE"]
            .into_iter()
            .map(|tag| (tag.to_string(), "es".to_string()))
            .collect();

        Self {
            default_locale: default_locale_tag(),
            fallbacks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocale {
    pub requested: String,
    pub tag: String,
    pub used_default: bool,
}

#[derive(Debug, Clone)]
pub struct LocaleResolver {
    default_locale: String,
    exact: BTreeMap<String, String>,
    wildcards: BTreeMap<String, String>,
    available: BTreeSet<String>,
}

impl LocaleResolver {
    pub fn new<I, S>(config: &LocaleConfig, available: I) -> Result<Self, LocaleError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let available = available
            .into_iter()
            .map(|tag| canonical_tag(tag.as_ref()))
            .collect::<BTreeSet<_>>();
        let default_locale = canonical_tag(&config.default_locale);
        if !available.contains(&default_locale) {
            return Err(LocaleError::DefaultUnavailable {
                default: default_locale,
                available: available.into_iter().collect(),
            });
        }

        let mut exact = BTreeMap::new();
        let mut wildcards = BTreeMap::new();
        for (from, to) in &config.fallbacks {
            let from_tag = canonical_tag(from);
            let to_tag = canonical_tag(to);
            if from_tag.is_empty() || to_tag.is_empty() || to_tag.contains('*') {
                return Err(LocaleError::InvalidFallback {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            match from_tag.strip_suffix("-*") {
                Some(language) if !language.is_empty() => {
                    wildcards.insert(language.to_string(), to_tag);
                }
                Some(_) => {
                    return Err(LocaleError::InvalidFallback {
                        from: from.clone(),
                        to: to.clone(),
                    })
                }
                None => {
                    exact.insert(from_tag, to_tag);
                }
            }
        }

        Ok(Self {
            default_locale,
            exact,
            wildcards,
            available,
        })
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.available.iter().map(String::as_str)
    }

    /// Follows the fallback chain until a loaded bundle is found, else the default.
    pub fn resolve(&self, requested: &str) -> ResolvedLocale {
        let mut current = canonical_tag(requested);
        let mut visited = HashSet::new();

        while !current.is_empty() && visited.insert(current.clone()) {
            if self.available.contains(&current) {
                return ResolvedLocale {
                    requested: requested.to_string(),
                    tag: current,
                    used_default: false,
                };
            }
            match self.next_fallback(&current) {
                Some(next) => current = next.to_string(),
                None => break,
            }
        }

        ResolvedLocale {
            requested: requested.to_string(),
            tag: self.default_locale.clone(),
            used_default: true,
        }
    }

    fn next_fallback(&self, tag: &str) -> Option<&str> {
        if let Some(next) = self.exact.get(tag) {
            return Some(next.as_str());
        }
        let (language, _region) = tag.split_once('-')?;
        self.wildcards.get(language).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(config: &LocaleConfig) -> LocaleResolver {
        LocaleResolver::new(config, ["en", "es", "fr"]).expect("resolver should build")
    }

    #[test]
    fn regional_spanish_folds_to_base_bundle() {
        let resolver = resolver(&LocaleConfig::default());
        for tag in ["es-419", "es-MX", "es_US", "ES-es"] {
            let resolved = resolver.resolve(tag);
            assert_eq!(resolved.tag, "es", "{tag}");
            assert!(!resolved.used_default);
        }
    }

    #[test]
    fn unknown_tags_use_default() {
        let resolver = resolver(&LocaleConfig::default());
        let resolved = resolver.resolve("de-DE");
        assert_eq!(resolved.tag, "en");
        assert!(resolved.used_default);
        assert!(resolver.resolve("").used_default);
        assert_eq!(resolver.resolve("es-AR").tag, "en");
    }

    #[test]
    fn wildcards_and_chains_are_followed() {
        let mut config = LocaleConfig::default();
        config.fallbacks.insert("es-*".to_string(), "es".to_string());
        config.fallbacks.insert("ca".to_string(), "es-ES".to_string());
        config.fallbacks.insert("fr-*".to_string(), "fr".to_string());
        let resolver = resolver(&config);

        assert_eq!(resolver.resolve("es-AR").tag, "es");
        assert_eq!(resolver.resolve("ca").tag, "es");
        assert_eq!(resolver.resolve("fr-CA").tag, "fr");
    }

    #[test]
    fn fallback_cycles_end_at_default() {
        let mut config = LocaleConfig::default();
        config.fallbacks.insert("xx".to_string(), "yy".to_string());
        config.fallbacks.insert("yy".to_string(), "xx".to_string());
        let resolved = resolver(&config).resolve("xx");
        assert_eq!(resolved.tag, "en");
        assert!(resolved.used_default);
    }

    #[test]
    fn missing_default_bundle_is_rejected() {
        let config = LocaleConfig {
            default_locale: "de".to_string(),
            fallbacks: BTreeMap::new(),
        };
        assert!(matches!(
            LocaleResolver::new(&config, ["en"]),
            Err(LocaleError::DefaultUnavailable { .. })
        ));
    }
}
