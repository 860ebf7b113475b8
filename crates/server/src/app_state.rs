use shared::protocol::PushEvent;
use tokio::sync::broadcast;

use crate::relay::RelayHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) relay: RelayHandle,
    pub(crate) events: broadcast::Sender<PushEvent>,
}
