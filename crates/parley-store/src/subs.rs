use parley_types::{SubUpdate, Subscription, Uid, time_now};

use crate::error::Result;
use crate::store::Store;

pub struct Subs<'a> {
    pub(crate) store: &'a Store,
}

impl Subs<'_> {
    /// Stamp creation time on every subscription and store them in one call.
    pub fn create(&self, subs: &mut [Subscription]) -> Result<()> {
        for sub in subs.iter_mut() {
            sub.init_times();
        }
        self.store.adapter().topic_share(subs)?;
        Ok(())
    }

    pub fn get(&self, topic: &str, user: Uid) -> Result<Option<Subscription>> {
        self.store.adapter().subscription_get(topic, user)
    }

    /// Update one subscription. `updated_at` is stamped only when
    /// `update_ts` is set.
    pub fn update(&self, topic: &str, user: Uid, mut update: SubUpdate, update_ts: bool) -> Result<()> {
        if update_ts {
            update.updated_at = Some(time_now());
        }
        self.store.adapter().subs_update(topic, Some(user), &update)
    }

    pub fn delete(&self, topic: &str, user: Uid) -> Result<()> {
        self.store.adapter().subs_delete(topic, user)
    }
}
