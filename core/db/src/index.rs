//! Keep the search index in sync with stored records.
use std::sync::Arc;

use anyhow::Result;

use netauth_context::Context;
use netauth_errors::Error;
use netauth_events::Event;
use netauth_events::EventCallback;
use netauth_kv::keys;
use netauth_kv::Kv;
use netauth_models::codec;
use netauth_search::SearchIndex;

/// Name the index updater registers with on the event bus.
pub const INDEX_CALLBACK: &str = "netauth-search-index";

/// Reindex records in response to change events.
///
/// Records are reloaded from storage for every event so the updater is idempotent
/// and tolerates duplicate or reordered events for the same record.
pub struct IndexUpdater {
    pub(crate) index: Arc<SearchIndex>,
    pub(crate) kv: Kv,
}

#[async_trait::async_trait]
impl EventCallback for IndexUpdater {
    async fn handle(&self, context: &Context, event: &Event) -> Result<()> {
        let is_entity = event.kind.is_entity();
        if event.kind.is_destroy() {
            self.forget(is_entity, &event.pk);
            return Ok(());
        }

        let key = match is_entity {
            true => keys::entity(&event.pk),
            false => keys::group(&event.pk),
        };
        let data = match self.kv.get(context, &key).await {
            Ok(data) => data,
            Err(error) if Error::NoValue(String::new()).is_kind(&error) => {
                self.forget(is_entity, &event.pk);
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        if is_entity {
            let entity = codec::decode_entity(&data)?;
            self.index.index_entity(&entity);
        } else {
            let group = codec::decode_group(&data)?;
            self.index.index_group(&group);
        }
        Ok(())
    }
}

impl IndexUpdater {
    fn forget(&self, is_entity: bool, pk: &str) {
        match is_entity {
            true => self.index.delete_entity(pk),
            false => self.index.delete_group(pk),
        }
    }
}
