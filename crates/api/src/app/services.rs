use std::sync::Arc;
use std::time::Duration;

use pourline_infra::commit::OrderCommitService;
use pourline_infra::pour::PourTrackingService;
use pourline_infra::realtime::{InMemoryConnectionRegistry, RealtimeBroadcaster};
use pourline_infra::store::InventoryStore;

pub type SharedStore = Arc<dyn InventoryStore>;
pub type RealtimeHub = Arc<RealtimeBroadcaster<InMemoryConnectionRegistry>>;

/// Everything the handlers need, built once at startup.
pub struct AppServices {
    pub store: SharedStore,
    pub realtime: RealtimeHub,
    pub commits: OrderCommitService<SharedStore, RealtimeHub>,
    pub pours: PourTrackingService<SharedStore, RealtimeHub>,
    pub heartbeat_interval: Duration,
}

impl AppServices {
    pub fn new(store: SharedStore, heartbeat_interval: Duration) -> Self {
        let realtime: RealtimeHub = Arc::new(RealtimeBroadcaster::new(InMemoryConnectionRegistry::new()));
        Self {
            commits: OrderCommitService::new(store.clone(), realtime.clone()),
            pours: PourTrackingService::new(store.clone(), realtime.clone()),
            store,
            realtime,
            heartbeat_interval,
        }
    }
}
