use std::sync::Arc;

use crate::auth::ApiKeyPolicy;
use crate::gateway::TaskGateway;

use super::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub gateway: TaskGateway,
    pub sessions: Arc<SessionRegistry>,
    pub auth: Arc<ApiKeyPolicy>,
}

impl AppState {
    pub fn new(gateway: TaskGateway, sessions: SessionRegistry, auth: ApiKeyPolicy) -> Self {
        Self {
            gateway,
            sessions: Arc::new(sessions),
            auth: Arc::new(auth),
        }
    }
}
