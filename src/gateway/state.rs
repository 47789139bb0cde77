use std::sync::Arc;

use crate::user_auth::IdentityService;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Identity service behind every `/api/sso` route
    pub identity: Arc<IdentityService>,
    /// Body limit for multipart profile updates
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(identity: Arc<IdentityService>, max_upload_bytes: usize) -> Self {
        Self {
            identity,
            max_upload_bytes,
        }
    }
}
