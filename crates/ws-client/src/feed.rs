// feed.rs — Today panel refresh with last-request-wins per filter.
//
// Every refresh bumps a generation counter for its filter key. When the
// response arrives it is applied only if no newer refresh for the same key
// was started in the meantime; otherwise it is dropped and the caller gets
// `Superseded`. Applied views replace the previous one wholesale.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ws_today::{PanelFilter, PanelView};

use crate::api::WorkstreamApi;
use crate::error::ClientError;

#[derive(Default)]
struct Slot {
    generation: u64,
    view: Option<Arc<PanelView>>,
}

pub struct PanelFeed<A> {
    api: Arc<A>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<A: WorkstreamApi> PanelFeed<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock_slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Slot>>, ClientError> {
        self.slots
            .lock()
            .map_err(|_| ClientError::Transient("panel feed poisoned".into()))
    }

    fn begin(&self, key: &str) -> Result<u64, ClientError> {
        let mut slots = self.lock_slots()?;
        let slot = slots.entry(key.to_string()).or_default();
        slot.generation += 1;
        Ok(slot.generation)
    }

    /// Fetch the panel for `filter` and install it if still the latest request.
    pub async fn refresh(&self, filter: PanelFilter) -> Result<Arc<PanelView>, ClientError> {
        let key = filter.key();
        let generation = self.begin(&key)?;

        let result = self.api.today_panel(filter).await;

        let mut slots = self.lock_slots()?;
        let slot = slots.entry(key.clone()).or_default();
        if slot.generation != generation {
            tracing::debug!(
                %key,
                generation,
                latest = slot.generation,
                "discarding superseded panel response"
            );
            return Err(ClientError::Superseded { key, generation });
        }

        let view = Arc::new(result?);
        slot.view = Some(view.clone());
        Ok(view)
    }

    /// The last applied view for `filter`, if any.
    pub fn current(&self, filter: &PanelFilter) -> Option<Arc<PanelView>> {
        self.lock_slots()
            .ok()?
            .get(&filter.key())
            .and_then(|slot| slot.view.clone())
    }
}
