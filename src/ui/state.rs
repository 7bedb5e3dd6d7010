//! Shared application state handed to the handlers.

use std::sync::Arc;

use crate::domain::RoomStore;
use crate::hub::HubHandle;
use crate::session::SessionConfig;

pub struct AppState {
    /// Handle to the running hub loop.
    pub hub: HubHandle,
    /// Persistence collaborator.
    pub store: Arc<dyn RoomStore>,
    /// Per-connection protocol knobs.
    pub session_config: SessionConfig,
}
