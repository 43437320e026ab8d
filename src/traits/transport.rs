use async_trait::async_trait;

use crate::error::Result;
use crate::hrana::{PipelineRequest, PipelineResponse};

/// Carries pipeline requests to a remote libSQL service.
///
/// One transport is created per process and shared by every remote
/// connection handle.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn pipeline(&self, request: &PipelineRequest) -> Result<PipelineResponse>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
