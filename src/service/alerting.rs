//! Alert state machine and notification dispatch.
//!
//! [`AlertStateMachine::decide`] is a pure transition function over the
//! current score and the prior [`AlertState`]. [`AlertDispatcher`] carries
//! out `Send`/`Update` through the notifier and persists the new state in a
//! single write. `Suppress` and failed sends leave the state untouched, so
//! the same transition is re-evaluated on the next cycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::AlertThresholds;
use crate::domain::{AlertDecision, AlertState, MessageHandle, ScoreResult};
use crate::error::RadarError;
use crate::notify::Notifier;
use crate::persistence::Storage;

/// Transition function from score and prior state to a decision.
#[derive(Debug, Clone, Copy)]
pub struct AlertStateMachine {
    thresholds: AlertThresholds,
}

impl AlertStateMachine {
    /// Creates a state machine with the given thresholds.
    #[must_use]
    pub const fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    /// Decides what to do with `current` given `prior`.
    #[must_use]
    pub fn decide(&self, current: &ScoreResult, prior: &AlertState) -> AlertDecision {
        let score = current.score;
        let Some(last_score) = prior.last_score else {
            if score >= self.thresholds.score_with_flags {
                return AlertDecision::Send;
            }
            if score >= self.thresholds.score && !current.has_hard_flag() {
                return AlertDecision::Send;
            }
            return AlertDecision::Suppress;
        };

        if score.abs_diff(last_score) >= self.thresholds.score_change {
            return AlertDecision::Update;
        }
        if current.risk_flags != prior.last_risk_flags && score >= self.thresholds.score {
            return AlertDecision::Update;
        }
        AlertDecision::Suppress
    }
}

/// How a dispatched alert reached the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was sent.
    Suppressed,
    /// A new message was sent.
    Sent(MessageHandle),
    /// The previous message was edited in place.
    Edited(MessageHandle),
    /// The edit failed and a new message replaced it.
    Resent(MessageHandle),
}

/// Executes alert decisions against the notifier and storage.
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    storage: Arc<dyn Storage>,
}

impl AlertDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, storage: Arc<dyn Storage>) -> Self {
        Self { notifier, storage }
    }

    /// Performs `decision` and persists the resulting alert state.
    ///
    /// # Errors
    ///
    /// Returns [`RadarError::Notify`] if a new message could not be sent
    /// (state untouched), or a persistence error from the state write.
    pub async fn dispatch(
        &self,
        decision: AlertDecision,
        score: &ScoreResult,
        content: &str,
        prior: &AlertState,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, RadarError> {
        let outcome = match decision {
            AlertDecision::Suppress => return Ok(DispatchOutcome::Suppressed),
            AlertDecision::Send => DispatchOutcome::Sent(self.notifier.send(content).await?),
            AlertDecision::Update => self.update(prior, content).await?,
        };

        let handle = match &outcome {
            DispatchOutcome::Sent(h) | DispatchOutcome::Edited(h) | DispatchOutcome::Resent(h) => {
                h.clone()
            }
            DispatchOutcome::Suppressed => return Ok(outcome),
        };
        let next = AlertState {
            mint: prior.mint.clone(),
            last_score: Some(score.score),
            last_sent_at: Some(now),
            message_handle: Some(handle),
            alert_count: prior.alert_count.saturating_add(1),
            last_risk_flags: score.risk_flags.clone(),
        };
        self.storage.update_alert(&next).await?;
        tracing::info!(
            mint = %score.mint,
            score = score.score,
            decision = decision.as_str(),
            alert_count = next.alert_count,
            "alert dispatched"
        );
        Ok(outcome)
    }

    async fn update(&self, prior: &AlertState, content: &str) -> Result<DispatchOutcome, RadarError> {
        if let Some(handle) = &prior.message_handle {
            match self.notifier.edit(handle, content).await {
                Ok(true) => return Ok(DispatchOutcome::Edited(handle.clone())),
                Ok(false) => {
                    tracing::info!(mint = %prior.mint, %handle, "edit target gone, sending new alert");
                }
                Err(e) => {
                    tracing::warn!(mint = %prior.mint, %handle, error = %e, "edit failed, sending new alert");
                }
            }
        }
        Ok(DispatchOutcome::Resent(self.notifier.send(content).await?))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{Mint, RiskFlag};
    use crate::persistence::InMemoryStorage;

    fn machine() -> AlertStateMachine {
        AlertStateMachine::new(AlertThresholds::default())
    }

    fn result(score: u8, flags: &[RiskFlag]) -> ScoreResult {
        ScoreResult {
            mint: Mint::from("MintA"),
            score,
            reasons: Vec::new(),
            risk_flags: flags.iter().copied().collect::<BTreeSet<_>>(),
            components: Vec::new(),
            computed_at: Utc::now(),
        }
    }

    fn alerted(last_score: u8, flags: &[RiskFlag]) -> AlertState {
        AlertState {
            last_score: Some(last_score),
            last_risk_flags: flags.iter().copied().collect(),
            message_handle: Some(MessageHandle::new("1")),
            alert_count: 1,
            ..AlertState::unalerted(Mint::from("MintA"))
        }
    }

    #[test]
    fn unalerted_transitions() {
        let fresh = AlertState::unalerted(Mint::from("MintA"));
        assert_eq!(machine().decide(&result(75, &[]), &fresh), AlertDecision::Send);
        assert_eq!(machine().decide(&result(69, &[]), &fresh), AlertDecision::Suppress);
        assert_eq!(
            machine().decide(&result(75, &[RiskFlag::MintAuthority]), &fresh),
            AlertDecision::Suppress
        );
        assert_eq!(
            machine().decide(&result(85, &[RiskFlag::MintAndFreezeAuthority]), &fresh),
            AlertDecision::Send
        );
        assert_eq!(
            machine().decide(&result(75, &[RiskFlag::NoVolume, RiskFlag::NewToken]), &fresh),
            AlertDecision::Send
        );
    }

    #[test]
    fn alerted_transitions() {
        let prior = alerted(75, &[RiskFlag::NewToken]);
        assert_eq!(
            machine().decide(&result(83, &[RiskFlag::NewToken]), &prior),
            AlertDecision::Suppress
        );
        assert_eq!(
            machine().decide(&result(65, &[RiskFlag::NewToken]), &prior),
            AlertDecision::Update
        );
        assert_eq!(machine().decide(&result(78, &[]), &prior), AlertDecision::Update);
        assert_eq!(machine().decide(&result(68, &[]), &prior), AlertDecision::Suppress);
    }

    #[test]
    fn flag_comparison_is_order_independent() {
        let prior = alerted(80, &[RiskFlag::WhaleHolder, RiskFlag::LowHolders]);
        let current = result(80, &[RiskFlag::LowHolders, RiskFlag::WhaleHolder]);
        assert_eq!(machine().decide(&current, &prior), AlertDecision::Suppress);
    }

    #[test]
    fn send_suppress_update_sequence() {
        let sm = machine();
        let fresh = AlertState::unalerted(Mint::from("MintA"));
        assert_eq!(sm.decide(&result(75, &[]), &fresh), AlertDecision::Send);
        let after_send = alerted(75, &[]);
        assert_eq!(sm.decide(&result(83, &[]), &after_send), AlertDecision::Suppress);
        assert_eq!(sm.decide(&result(60, &[]), &after_send), AlertDecision::Update);
    }

    #[derive(Debug, Default)]
    struct ScriptedNotifier {
        edit_result: Option<bool>,
        fail_send: bool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn send(&self, content: &str) -> Result<MessageHandle, RadarError> {
            if self.fail_send {
                return Err(RadarError::Notify("down".to_string()));
            }
            let mut sent = self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            sent.push(content.to_string());
            Ok(MessageHandle::new(format!("new-{}", sent.len())))
        }

        async fn edit(&self, _handle: &MessageHandle, _content: &str) -> Result<bool, RadarError> {
            match self.edit_result {
                Some(ok) => Ok(ok),
                None => Err(RadarError::Notify("edit transport".to_string())),
            }
        }
    }

    fn dispatcher(notifier: ScriptedNotifier) -> (AlertDispatcher, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let storage_dyn: Arc<dyn Storage> = Arc::clone(&storage) as Arc<dyn Storage>;
        (
            AlertDispatcher::new(Arc::new(notifier), storage_dyn),
            storage,
        )
    }

    #[tokio::test]
    async fn send_persists_new_state() {
        let (d, storage) = dispatcher(ScriptedNotifier::default());
        let prior = AlertState::unalerted(Mint::from("MintA"));
        let score = result(75, &[RiskFlag::NewToken]);
        let Ok(outcome) = d.dispatch(AlertDecision::Send, &score, "hi", &prior, Utc::now()).await
        else {
            panic!("dispatch failed");
        };
        assert_eq!(outcome, DispatchOutcome::Sent(MessageHandle::new("new-1")));
        let Ok(state) = storage.get_or_create_alert(&Mint::from("MintA")).await else {
            panic!("state missing");
        };
        assert_eq!(state.last_score, Some(75));
        assert_eq!(state.alert_count, 1);
        assert!(state.last_risk_flags.contains(&RiskFlag::NewToken));
    }

    #[tokio::test]
    async fn update_edits_in_place() {
        let (d, storage) = dispatcher(ScriptedNotifier {
            edit_result: Some(true),
            ..ScriptedNotifier::default()
        });
        let prior = alerted(75, &[]);
        let Ok(outcome) = d
            .dispatch(AlertDecision::Update, &result(60, &[]), "x", &prior, Utc::now())
            .await
        else {
            panic!("dispatch failed");
        };
        assert_eq!(outcome, DispatchOutcome::Edited(MessageHandle::new("1")));
        let Ok(state) = storage.get_or_create_alert(&Mint::from("MintA")).await else {
            panic!("state missing");
        };
        assert_eq!(state.alert_count, 2);
        assert_eq!(state.last_score, Some(60));
    }

    #[tokio::test]
    async fn failed_edit_falls_back_to_send() {
        for edit_result in [Some(false), None] {
            let (d, storage) = dispatcher(ScriptedNotifier {
                edit_result,
                ..ScriptedNotifier::default()
            });
            let prior = alerted(75, &[]);
            let Ok(outcome) = d
                .dispatch(AlertDecision::Update, &result(60, &[]), "x", &prior, Utc::now())
                .await
            else {
                panic!("dispatch failed");
            };
            assert_eq!(outcome, DispatchOutcome::Resent(MessageHandle::new("new-1")));
            let Ok(state) = storage.get_or_create_alert(&Mint::from("MintA")).await else {
                panic!("state missing");
            };
            assert_eq!(state.message_handle, Some(MessageHandle::new("new-1")));
            assert_eq!(state.alert_count, 2);
        }
    }

    #[tokio::test]
    async fn failed_send_leaves_state_untouched() {
        let (d, storage) = dispatcher(ScriptedNotifier {
            fail_send: true,
            ..ScriptedNotifier::default()
        });
        let prior = AlertState::unalerted(Mint::from("MintA"));
        let outcome = d
            .dispatch(AlertDecision::Send, &result(90, &[]), "x", &prior, Utc::now())
            .await;
        assert!(matches!(outcome, Err(RadarError::Notify(_))));
        let Ok(state) = storage.get_or_create_alert(&Mint::from("MintA")).await else {
            panic!("state missing");
        };
        assert!(!state.is_alerted());
    }

    #[tokio::test]
    async fn suppress_does_nothing() {
        let (d, storage) = dispatcher(ScriptedNotifier::default());
        let prior = alerted(75, &[]);
        let Ok(outcome) = d
            .dispatch(AlertDecision::Suppress, &result(76, &[]), "x", &prior, Utc::now())
            .await
        else {
            panic!("dispatch failed");
        };
        assert_eq!(outcome, DispatchOutcome::Suppressed);
        let Ok(state) = storage.get_or_create_alert(&Mint::from("MintA")).await else {
            panic!("state missing");
        };
        assert!(!state.is_alerted());
    }
}
