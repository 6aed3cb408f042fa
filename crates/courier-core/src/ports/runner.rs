//! TaskRunner port: one remote operation per task type.
//!
//! The embedding SDK implements this over its HTTP client. Implementations
//! report network-level failures (timeouts, non-2xx) as
//! [`RunError::Retryable`]; the queue decides retry, not the runner.
//! Each implementation's own network client bounds call duration.

use async_trait::async_trait;

use crate::domain::{
    DeletePushTokenPayload, IdentifyProfilePayload, RegisterDeviceTokenPayload, TrackEventPayload,
    TrackPushMetricPayload,
};
use crate::error::RunError;

#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn identify_profile(&self, payload: IdentifyProfilePayload) -> Result<(), RunError>;

    async fn track_event(&self, payload: TrackEventPayload) -> Result<(), RunError>;

    async fn register_device_token(
        &self,
        payload: RegisterDeviceTokenPayload,
    ) -> Result<(), RunError>;

    async fn delete_device_token(&self, payload: DeletePushTokenPayload) -> Result<(), RunError>;

    async fn track_push_metric(&self, payload: TrackPushMetricPayload) -> Result<(), RunError>;
}
