use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use codecolors_core::{ConversationEvent, IntentRegistry, IntentRouter, RouteOutcome};
use codecolors_i18n::LocaleBundles;
use codecolors_observability::AppMetrics;
use codecolors_storage::UserStateRepository;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Loads and validates the bundles under `locales_dir` and wires the default intent table.
pub fn build_router(locales_dir: impl AsRef<Path>) -> Result<IntentRouter> {
    let locales_dir = locales_dir.as_ref();
    let bundles = LocaleBundles::from_dir(locales_dir)
        .with_context(|| format!("failed loading locales from {}", locales_dir.display()))?;
    bundles.validate()?;
    let resolver = bundles.resolver()?;

    let stats = bundles.stats();
    info!(
        locales = ?stats.locales,
        default_locale = %stats.default_locale,
        templates = stats.templates_loaded,
        "locale bundles ready"
    );

    Ok(IntentRouter::new(
        IntentRegistry::default(),
        resolver,
        Arc::new(bundles),
    ))
}

#[derive(Clone)]
pub struct FulfillmentAgent<S>
where
    S: UserStateRepository,
{
    router: Arc<IntentRouter>,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
}

impl<S> FulfillmentAgent<S>
where
    S: UserStateRepository,
{
    pub fn new(router: Arc<IntentRouter>, store: Arc<S>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            router,
            store,
            metrics,
        }
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    /// Routes an event whose stored state was supplied by the caller.
    #[instrument(skip(self, event), fields(intent_name = %event.intent_name))]
    pub fn handle_event(&self, event: &ConversationEvent) -> Result<RouteOutcome> {
        let started = Instant::now();
        let turn_id = Uuid::new_v4();
        self.metrics.inc_request();

        let outcome = match self.router.route(event) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.metrics.inc_error();
                self.metrics.observe_latency(started.elapsed());
                warn!(turn_id = %turn_id, error = %error, "routing failed");
                return Err(error.into());
            }
        };
        match &outcome {
            RouteOutcome::Handled(turn) => {
                self.metrics
                    .record_handled(turn.intent.as_str(), turn.directive.terminal);
                if turn.fail_closed {
                    self.metrics.inc_fail_closed(turn.intent.as_str());
                }
                if turn.locale.used_default {
                    self.metrics.inc_locale_default();
                }
                info!(
                    turn_id = %turn_id,
                    intent = turn.intent.as_str(),
                    requested_locale = %turn.locale.requested,
                    locale = %turn.locale.tag,
                    screen = event.capabilities.has_screen(),
                    prompts = turn.directive.prompts.len(),
                    terminal = turn.directive.terminal,
                    state_updated = turn.directive.updated_state.is_some(),
                    fail_closed = turn.fail_closed,
                    "intent handled"
                );
            }
            RouteOutcome::Unhandled => {
                self.metrics.inc_unhandled();
                debug!(turn_id = %turn_id, "no handler registered, deferring to platform fallback");
            }
        }

        self.metrics.observe_latency(started.elapsed());
        Ok(outcome)
    }

    /// Routes an event for a host that does not carry user storage itself:
    /// the slot is read from the repository and any update is written back.
    #[instrument(skip(self, event))]
    pub async fn handle_turn(
        &self,
        user_id: &str,
        mut event: ConversationEvent,
    ) -> Result<RouteOutcome> {
        if let Some(state) = self
            .store
            .load_state(user_id)
            .await
            .context("failed loading user state")?
        {
            event.stored_state = state;
        }

        let outcome = self.handle_event(&event)?;
        if let Some(state) = outcome
            .directive()
            .and_then(|directive| directive.updated_state.as_ref())
        {
            self.store
                .save_state(user_id, state)
                .await
                .context("failed saving user state")?;
        }

        Ok(outcome)
    }

    pub async fn forget_user(&self, user_id: &str) -> Result<bool> {
        self.store.clear_state(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use codecolors_core::{LocaleConfig, PlatformArguments, PromptFragment};
    use codecolors_storage::MemoryStore;

    use super::*;

    fn agent() -> FulfillmentAgent<MemoryStore> {
        let locales = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../locales");
        let router = build_router(locales).expect("router should build");
        FulfillmentAgent::new(
            Arc::new(router),
            Arc::new(MemoryStore::new()),
            AppMetrics::shared(),
        )
    }

    #[tokio::test]
    async fn granted_name_is_remembered_across_turns() {
        let agent = agent();

        let first = agent
            .handle_turn("user-1", ConversationEvent::new("Default Welcome Intent"))
            .await
            .unwrap();
        assert!(matches!(
            first.directive().unwrap().prompts[0],
            PromptFragment::PermissionRequest { .. }
        ));

        let grant = ConversationEvent::new("actions_intent_PERMISSION").with_arguments(
            PlatformArguments {
                permission_granted: Some(true),
                profile_display_name: Some("Ada Lovelace".to_string()),
                ..PlatformArguments::default()
            },
        );
        agent.handle_turn("user-1", grant).await.unwrap();

        let again = agent
            .handle_turn("user-1", ConversationEvent::new("Default Welcome Intent"))
            .await
            .unwrap();
        let transcript = again.directive().unwrap().transcript();
        assert!(transcript.contains("Ada"));
        assert!(!transcript.contains("Lovelace"));

        assert!(agent.forget_user("user-1").await.unwrap());
    }

    #[test]
    fn metrics_track_outcomes() {
        let agent = agent();
        agent
            .handle_event(&ConversationEvent::new("order pizza"))
            .unwrap();
        agent
            .handle_event(
                &ConversationEvent::new("favorite fake color")
                    .with_parameter("fakeColor", "plaid")
                    .with_locale("pt-BR"),
            )
            .unwrap();
        agent
            .handle_event(&ConversationEvent::new("test").with_locale("es-US"))
            .unwrap();

        let snapshot = agent.metrics().snapshot();
        assert_eq!(snapshot.requests_total, 3);
        assert_eq!(snapshot.unhandled_total, 1);
        assert_eq!(snapshot.handled_total, 2);
        assert_eq!(snapshot.fail_closed_total, 1);
        assert_eq!(snapshot.locale_default_total, 1);
        assert_eq!(snapshot.terminal_total, 1);
        assert_eq!(snapshot.errors_total, 0);
        assert_eq!(snapshot.latency_samples, 2);
    }

    #[test]
    fn failed_route_still_records_latency() {
        let en = BTreeMap::from([("welcome.greeting_again".to_string(), "Hi %s.".to_string())]);
        let bundles = LocaleBundles::from_bundles(LocaleConfig::default(), [("en".to_string(), en)]);
        let resolver = bundles.resolver().unwrap();
        let router = IntentRouter::new(IntentRegistry::default(), resolver, Arc::new(bundles));
        let agent = FulfillmentAgent::new(
            Arc::new(router),
            Arc::new(MemoryStore::new()),
            AppMetrics::shared(),
        );

        assert!(agent.handle_event(&ConversationEvent::new("test")).is_err());

        let snapshot = agent.metrics().snapshot();
        assert_eq!(snapshot.requests_total, 1);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.latency_samples, 1);
        assert_eq!(snapshot.handled_total, 0);
    }
}
