mod flatten;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use codecolors_core::{
    canonical_tag, placeholder_count, LocaleConfig, LocaleError, LocaleResolver, MessageKey,
    MessageSource,
};
use serde::Serialize;
use walkdir::WalkDir;

pub use flatten::flatten_bundle;

/// File holding the fallback table, next to the bundle files.
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize)]
pub struct BundleStats {
    pub locales: Vec<String>,
    pub default_locale: String,
    pub templates_loaded: usize,
}

/// Problems found by [`LocaleBundles::check`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleReport {
    /// Keys absent or blank, per locale.
    pub missing: BTreeMap<String, Vec<&'static str>>,
    /// Keys whose placeholder count differs from the default bundle, per locale.
    pub placeholder_mismatches: BTreeMap<String, Vec<&'static str>>,
}

impl BundleReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.placeholder_mismatches.is_empty()
    }
}

/// Key to template maps for every locale, loaded once at startup.
#[derive(Debug, Clone)]
pub struct LocaleBundles {
    bundles: BTreeMap<String, BTreeMap<String, String>>,
    config: LocaleConfig,
}

impl LocaleBundles {
    /// Loads every `<tag>.json` directly under `path`, plus the optional `config.json`.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        let mut bundles = BTreeMap::new();
        let mut config = LocaleConfig::default();

        for entry in WalkDir::new(root)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("json"))
        {
            let path = entry.path();
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading locale file: {}", path.display()))?;

            if entry.file_name() == CONFIG_FILE_NAME {
                config = serde_json::from_str(&raw)
                    .with_context(|| format!("invalid locale config: {}", path.display()))?;
                continue;
            }

            let Some(tag) = path.file_stem().and_then(|stem| stem.to_str()).map(canonical_tag)
            else {
                continue;
            };
            let value = serde_json::from_str::<serde_json::Value>(&raw)
                .with_context(|| format!("invalid locale bundle: {}", path.display()))?;
            if !value.is_object() {
                bail!("locale bundle {} must be a JSON object", path.display());
            }

            let flat = flatten_bundle(&value);
            tracing::debug!(locale = %tag, templates = flat.len(), "locale bundle loaded");
            bundles.insert(tag, flat);
        }

        if bundles.is_empty() {
            bail!("no locale bundles found under {}", root.display());
        }

        Ok(Self { bundles, config })
    }

    pub fn from_bundles(
        config: LocaleConfig,
        bundles: impl IntoIterator<Item = (String, BTreeMap<String, String>)>,
    ) -> Self {
        Self {
            bundles: bundles
                .into_iter()
                .map(|(tag, bundle)| (canonical_tag(&tag), bundle))
                .collect(),
            config,
        }
    }

    pub fn config(&self) -> &LocaleConfig {
        &self.config
    }

    pub fn resolver(&self) -> Result<LocaleResolver, LocaleError> {
        LocaleResolver::new(&self.config, self.bundles.keys())
    }

    pub fn stats(&self) -> BundleStats {
        BundleStats {
            locales: self.bundles.keys().cloned().collect(),
            default_locale: canonical_tag(&self.config.default_locale),
            templates_loaded: self.bundles.values().map(BTreeMap::len).sum(),
        }
    }

    pub fn check(&self) -> BundleReport {
        let default_bundle = self.bundles.get(&canonical_tag(&self.config.default_locale));
        let mut report = BundleReport::default();

        for (tag, bundle) in &self.bundles {
            let mut missing = Vec::new();
            let mut mismatched = Vec::new();

            for key in MessageKey::ALL {
                let path = key.path();
                let Some(template) = bundle.get(path).filter(|t| !t.trim().is_empty()) else {
                    missing.push(path);
                    continue;
                };
                let expected = default_bundle
                    .and_then(|bundle| bundle.get(path))
                    .map(|t| placeholder_count(t));
                if expected.is_some_and(|count| count != placeholder_count(template)) {
                    mismatched.push(path);
                }
            }

            if !missing.is_empty() {
                report.missing.insert(tag.clone(), missing);
            }
            if !mismatched.is_empty() {
                report.placeholder_mismatches.insert(tag.clone(), mismatched);
            }
        }

        report
    }

    /// Fails when the default bundle cannot answer every key; other gaps are logged.
    pub fn validate(&self) -> Result<BundleReport> {
        let resolver = self.resolver()?;
        let report = self.check();

        if let Some(keys) = report.missing.get(resolver.default_locale()) {
            bail!(
                "default locale `{}` is missing templates: {}",
                resolver.default_locale(),
                keys.join(", ")
            );
        }
        for (tag, keys) in &report.missing {
            tracing::warn!(locale = %tag, keys = ?keys, "locale falls back to default for missing templates");
        }
        for (tag, keys) in &report.placeholder_mismatches {
            tracing::warn!(locale = %tag, keys = ?keys, "placeholder count differs from default locale");
        }

        Ok(report)
    }
}

impl MessageSource for LocaleBundles {
    fn locales(&self) -> Vec<String> {
        self.bundles.keys().cloned().collect()
    }

    fn template(&self, locale: &str, key: &str) -> Option<&str> {
        self.bundles.get(locale)?.get(key).map(String::as_str)
    }
}
