use crate::domain::model::EffectKind;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Device-control operations the dispatcher needs from the downstream API.
///
/// Implementations must report every failure as
/// [`GatewayError::DownstreamFailure`](crate::utils::error::GatewayError::DownstreamFailure)
/// and make exactly one attempt per call.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    async fn apply_effect(
        &self,
        target_id: &str,
        effect: EffectKind,
        intensity: u8,
        duration_ms: u16,
    ) -> Result<()>;

    async fn stop(&self, target_id: &str) -> Result<()>;
}
