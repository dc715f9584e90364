use crate::core::limiter;
use crate::domain::model::{
    Command, CommandKind, DispatchResult, EffectKind, LimitPolicy, Target, TargetEntry,
    TargetFailure, TargetOutcome, DEFAULT_BEEP_INTENSITY, MAX_DURATION_MS, MAX_INTENSITY,
    MIN_DURATION_MS, MIN_INTENSITY,
};
use crate::domain::ports::DeviceControl;
use crate::utils::error::{GatewayError, Result};
use crate::utils::validation::{validate_param_range, validate_required_param};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Validated, ready-to-send action for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Effect {
        kind: EffectKind,
        requested: u8,
        effective: u8,
        duration_ms: u16,
    },
    Stop,
}

/// Pending result for one target: either rejected locally or in flight.
enum Pending {
    Rejected(GatewayError),
    InFlight(Action, JoinHandle<Result<()>>),
}

pub struct CommandDispatcher {
    device: Arc<dyn DeviceControl>,
    policy: LimitPolicy,
}

impl CommandDispatcher {
    pub fn new(device: Arc<dyn DeviceControl>, policy: LimitPolicy) -> Self {
        Self { device, policy }
    }

    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    /// Validates and forwards every target of `command`.
    ///
    /// Targets are independent: a rejected target does not stop the others.
    /// Downstream calls run concurrently on spawned tasks, so a caller that
    /// goes away does not cancel device actions already sent. Outcomes keep
    /// the submitted target order.
    pub async fn dispatch(&self, command: Command) -> DispatchResult {
        let kind = command.kind();
        let entries = command.into_entries();

        tracing::info!(command = %kind, targets = entries.len(), "Dispatching command");

        let pending: Vec<(String, Pending)> = entries
            .into_iter()
            .map(|entry| match entry {
                TargetEntry::Valid(target) => {
                    let pending = match self.prepare(kind, &target) {
                        Ok(action) => {
                            let handle = self.spawn_call(target.id.clone(), action.clone());
                            Pending::InFlight(action, handle)
                        }
                        Err(e) => reject(&target.id, e),
                    };
                    (target.id, pending)
                }
                TargetEntry::Malformed(malformed) => {
                    let pending = reject(&malformed.id, malformed.to_error());
                    (malformed.id, pending)
                }
            })
            .collect();

        let outcomes = join_all(pending.into_iter().map(|(id, pending)| async move {
            match pending {
                Pending::Rejected(e) => rejected_outcome(id, &e),
                Pending::InFlight(action, handle) => {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(join_err) => Err(GatewayError::DownstreamFailure {
                            target_id: id.clone(),
                            status_code: None,
                            reason: format!("downstream task aborted: {}", join_err),
                        }),
                    };
                    if let Err(e) = &result {
                        tracing::error!(target_id = %id, error = %e, "Downstream call failed");
                    }
                    completed_outcome(id, &action, result.err())
                }
            }
        }))
        .await;

        let result = DispatchResult::new(kind, outcomes);
        tracing::info!(
            command = %kind,
            succeeded = result.succeeded_count(),
            total = result.applied.len(),
            status = ?result.downstream_status,
            "Command dispatched"
        );
        result
    }

    fn prepare(&self, kind: CommandKind, target: &Target) -> Result<Action> {
        if target.id.trim().is_empty() {
            return Err(GatewayError::invalid_parameter(
                Some(&target.id),
                "id",
                "target id cannot be empty",
            ));
        }

        match kind {
            CommandKind::Shock => {
                let (requested, duration_ms) = validate_intensity_and_duration(target)?;
                let effective = limiter::clamp_audited(&target.id, requested, &self.policy);
                Ok(Action::Effect {
                    kind: EffectKind::Shock,
                    requested,
                    effective,
                    duration_ms,
                })
            }
            CommandKind::Vibrate => {
                let (requested, duration_ms) = validate_intensity_and_duration(target)?;
                Ok(Action::Effect {
                    kind: EffectKind::Vibrate,
                    requested,
                    effective: requested,
                    duration_ms,
                })
            }
            CommandKind::Beep => {
                let duration_ms = validate_duration(target)?;
                let requested = validate_intensity(
                    &target.id,
                    target.intensity.unwrap_or(DEFAULT_BEEP_INTENSITY),
                )?;
                Ok(Action::Effect {
                    kind: EffectKind::Beep,
                    requested,
                    effective: requested,
                    duration_ms,
                })
            }
            CommandKind::Stop => Ok(Action::Stop),
        }
    }

    fn spawn_call(&self, target_id: String, action: Action) -> JoinHandle<Result<()>> {
        let device = Arc::clone(&self.device);
        let call = async move {
            match action {
                Action::Effect {
                    kind,
                    effective,
                    duration_ms,
                    ..
                } => {
                    device
                        .apply_effect(&target_id, kind, effective, duration_ms)
                        .await
                }
                Action::Stop => device.stop(&target_id).await,
            }
        };
        // 保留請求的 span，讓下游呼叫的日誌帶有 request_id
        tokio::spawn(call.in_current_span())
    }
}

fn reject(target_id: &str, err: GatewayError) -> Pending {
    tracing::warn!(target_id = %target_id, error = %err, "Target rejected");
    Pending::Rejected(err)
}

fn validate_intensity(target_id: &str, value: i64) -> Result<u8> {
    validate_param_range(target_id, "intensity", value, MIN_INTENSITY, MAX_INTENSITY)?;
    Ok(value as u8)
}

fn validate_duration(target: &Target) -> Result<u16> {
    let value = validate_required_param(&target.id, "duration_ms", target.duration_ms)?;
    validate_param_range(&target.id, "duration_ms", value, MIN_DURATION_MS, MAX_DURATION_MS)?;
    Ok(value as u16)
}

fn validate_intensity_and_duration(target: &Target) -> Result<(u8, u16)> {
    let intensity = validate_required_param(&target.id, "intensity", target.intensity)?;
    let intensity = validate_intensity(&target.id, intensity)?;
    let duration_ms = validate_duration(target)?;
    Ok((intensity, duration_ms))
}

fn rejected_outcome(id: String, err: &GatewayError) -> TargetOutcome {
    TargetOutcome {
        id,
        requested_intensity: None,
        effective_intensity: None,
        duration_ms: None,
        error: Some(TargetFailure::from(err)),
    }
}

fn completed_outcome(id: String, action: &Action, err: Option<GatewayError>) -> TargetOutcome {
    let (requested_intensity, effective_intensity, duration_ms) = match action {
        Action::Effect {
            requested,
            effective,
            duration_ms,
            ..
        } => (Some(*requested), Some(*effective), Some(*duration_ms)),
        Action::Stop => (None, None, None),
    };

    TargetOutcome {
        id,
        requested_intensity,
        effective_intensity,
        duration_ms,
        error: err.as_ref().map(TargetFailure::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DownstreamStatus;
    use crate::utils::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Effect(String, EffectKind, u8, u16),
        Stop(String),
    }

    /// Records calls in completion order.
    #[derive(Default)]
    struct RecordingDevice {
        calls: Mutex<Vec<Call>>,
        failing_ids: Vec<String>,
        slow_ids: Vec<String>,
    }

    impl RecordingDevice {
        fn failing(ids: &[&str]) -> Self {
            Self {
                failing_ids: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        fn slow(ids: &[&str]) -> Self {
            Self {
                slow_ids: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        async fn latency(&self, target_id: &str) {
            if self.slow_ids.iter().any(|id| id == target_id) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn outcome(&self, target_id: &str) -> Result<()> {
            if self.failing_ids.iter().any(|id| id == target_id) {
                return Err(GatewayError::DownstreamFailure {
                    target_id: target_id.to_string(),
                    status_code: Some(404),
                    reason: "shocker not found".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeviceControl for RecordingDevice {
        async fn apply_effect(
            &self,
            target_id: &str,
            effect: EffectKind,
            intensity: u8,
            duration_ms: u16,
        ) -> Result<()> {
            self.latency(target_id).await;
            self.calls.lock().unwrap().push(Call::Effect(
                target_id.to_string(),
                effect,
                intensity,
                duration_ms,
            ));
            self.outcome(target_id)
        }

        async fn stop(&self, target_id: &str) -> Result<()> {
            self.latency(target_id).await;
            self.calls.lock().unwrap().push(Call::Stop(target_id.to_string()));
            self.outcome(target_id)
        }
    }

    fn dispatcher(device: Arc<RecordingDevice>, max_intensity: u8) -> CommandDispatcher {
        CommandDispatcher::new(device, LimitPolicy::new(max_intensity))
    }

    #[tokio::test]
    async fn test_shock_is_clamped_and_reports_both_intensities() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::new(CommandKind::Shock, vec![Target::new("dev-1", Some(80), Some(1000))]).unwrap();

        let result = dispatcher(device.clone(), 50).dispatch(command).await;

        assert_eq!(result.downstream_status, DownstreamStatus::Success);
        assert_eq!(result.applied[0].requested_intensity, Some(80));
        assert_eq!(result.applied[0].effective_intensity, Some(50));
        assert_eq!(
            device.calls(),
            vec![Call::Effect("dev-1".to_string(), EffectKind::Shock, 50, 1000)]
        );
    }

    #[tokio::test]
    async fn test_vibrate_and_beep_ignore_limit() {
        let device = Arc::new(RecordingDevice::default());
        let dispatcher = dispatcher(device.clone(), 10);

        let vibrate = Command::new(CommandKind::Vibrate, vec![Target::new("a", Some(90), Some(500))]).unwrap();
        let beep = Command::new(CommandKind::Beep, vec![Target::new("b", Some(70), Some(500))]).unwrap();

        let vibrate = dispatcher.dispatch(vibrate).await;
        let beep = dispatcher.dispatch(beep).await;

        assert_eq!(vibrate.applied[0].effective_intensity, Some(90));
        assert_eq!(beep.applied[0].effective_intensity, Some(70));
        assert_eq!(
            device.calls(),
            vec![
                Call::Effect("a".to_string(), EffectKind::Vibrate, 90, 500),
                Call::Effect("b".to_string(), EffectKind::Beep, 70, 500),
            ]
        );
    }

    #[tokio::test]
    async fn test_beep_defaults_intensity_but_still_validates_it() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::new(
            CommandKind::Beep,
            vec![Target::new("a", None, Some(300)), Target::new("b", Some(101), Some(300))],
        )
        .unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.applied[0].effective_intensity, Some(50));
        assert!(result.applied[0].succeeded());
        let err = result.applied[1].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        assert_eq!(err.field.as_deref(), Some("intensity"));
        assert_eq!(device.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_short_duration_is_rejected_without_downstream_call() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::new(CommandKind::Shock, vec![Target::new("dev-1", Some(10), Some(100))]).unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.downstream_status, DownstreamStatus::Failure);
        let err = result.applied[0].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        assert_eq!(err.field.as_deref(), Some("duration_ms"));
        assert!(err.message.contains("dev-1"));
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_targets_yield_partial_failure_in_input_order() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::new(
            CommandKind::Shock,
            vec![
                Target::new("bad", Some(0), Some(1000)),
                Target::new("good", Some(40), Some(1000)),
            ],
        )
        .unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.downstream_status, DownstreamStatus::PartialFailure);
        assert_eq!(result.applied[0].id, "bad");
        assert!(!result.applied[0].succeeded());
        assert_eq!(result.applied[1].id, "good");
        assert!(result.applied[1].succeeded());
        assert_eq!(
            device.calls(),
            vec![Call::Effect("good".to_string(), EffectKind::Shock, 40, 1000)]
        );
    }

    #[tokio::test]
    async fn test_stop_needs_only_id() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::new(CommandKind::Stop, vec![Target::stop("a"), Target::stop("b")]).unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.downstream_status, DownstreamStatus::Success);
        assert_eq!(result.applied[0].requested_intensity, None);
        let mut calls = device.calls();
        calls.sort_by_key(|c| format!("{:?}", c));
        assert_eq!(calls, vec![Call::Stop("a".to_string()), Call::Stop("b".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::new(CommandKind::Stop, vec![Target::stop("  ")]).unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.applied[0].error.as_ref().unwrap().field.as_deref(), Some("id"));
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_downstream_failure_does_not_abort_siblings() {
        let device = Arc::new(RecordingDevice::failing(&["missing"]));
        let command = Command::new(
            CommandKind::Vibrate,
            vec![
                Target::new("ok-1", Some(10), Some(500)),
                Target::new("missing", Some(10), Some(500)),
                Target::new("ok-2", Some(10), Some(500)),
            ],
        )
        .unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.downstream_status, DownstreamStatus::PartialFailure);
        let ids: Vec<&str> = result.applied.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["ok-1", "missing", "ok-2"]);
        let err = result.applied[1].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::DownstreamFailure);
        assert_eq!(err.status_code, Some(404));
        assert_eq!(device.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_outcomes_keep_submitted_order_when_completion_order_differs() {
        let device = Arc::new(RecordingDevice::slow(&["slow"]));
        let command = Command::new(
            CommandKind::Vibrate,
            vec![
                Target::new("slow", Some(10), Some(500)),
                Target::new("fast", Some(10), Some(500)),
            ],
        )
        .unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(
            device.calls(),
            vec![
                Call::Effect("fast".to_string(), EffectKind::Vibrate, 10, 500),
                Call::Effect("slow".to_string(), EffectKind::Vibrate, 10, 500),
            ]
        );
        let ids: Vec<&str> = result.applied.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["slow", "fast"]);
        assert_eq!(result.downstream_status, DownstreamStatus::Success);
    }

    #[tokio::test]
    async fn test_malformed_entry_fails_alone() {
        let device = Arc::new(RecordingDevice::default());
        let command = Command::parse(
            "SHOCK",
            &serde_json::json!({"shockers": [
                {"id": "good", "intensity": 20, "duration": 1000},
                {"id": "bad", "intensity": "80", "duration": 1000}
            ]}),
        )
        .unwrap();

        let result = dispatcher(device.clone(), 0).dispatch(command).await;

        assert_eq!(result.downstream_status, DownstreamStatus::PartialFailure);
        assert!(result.applied[0].succeeded());
        assert_eq!(result.applied[1].id, "bad");
        let err = result.applied[1].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
        assert_eq!(err.field.as_deref(), Some("intensity"));
        assert_eq!(
            device.calls(),
            vec![Call::Effect("good".to_string(), EffectKind::Shock, 20, 1000)]
        );
    }
}
