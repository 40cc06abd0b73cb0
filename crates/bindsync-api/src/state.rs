use std::sync::Arc;

use bindsync_bridge::relay::RelayCore;
use bindsync_store::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<Database>,
    pub relay: Arc<RelayCore>,
    pub config_loaded: bool,
}
