//! Client-to-host transport abstraction.

use async_trait::async_trait;

use crate::api::{MoveOutcome, MoveRequest, Result, SessionHandle};
use crate::snapshot::SessionSnapshot;

/// What a participant needs from the authoritative host.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn move_token(&self, request: MoveRequest) -> Result<MoveOutcome>;

    async fn refresh(&self) -> Result<SessionSnapshot>;
}

#[async_trait]
impl SessionTransport for SessionHandle {
    async fn move_token(&self, request: MoveRequest) -> Result<MoveOutcome> {
        self.submit_move(request).await
    }

    async fn refresh(&self) -> Result<SessionSnapshot> {
        SessionHandle::refresh(self).await
    }
}
