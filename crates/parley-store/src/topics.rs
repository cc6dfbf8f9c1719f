use serde_json::Value;
use tracing::debug;

use parley_types::{AccessMode, QueryOpt, Subscription, Topic, TopicUpdate, Uid, time_now};

use crate::error::Result;
use crate::store::Store;

pub struct Topics<'a> {
    pub(crate) store: &'a Store,
}

impl Topics<'_> {
    /// Store a topic and, unless `owner` is zero, the owner's subscription
    /// to it.
    ///
    /// The owner is given full access and wants whatever the topic's policy
    /// grants them. The two writes are separate: a failed subscription leaves
    /// the topic row behind.
    pub fn create(&self, topic: &mut Topic, owner: Uid, private: Option<Value>) -> Result<()> {
        topic.init_times();
        topic.touched_at = Some(topic.created_at);

        self.store.adapter().topic_create(topic)?;

        if owner.is_zero() {
            return Ok(());
        }
        let mut sub = [Subscription {
            topic: topic.name.clone(),
            user: owner,
            mode_given: AccessMode::FULL,
            mode_want: topic.access_for(owner),
            private,
            ..Default::default()
        }];
        self.store.subs().create(&mut sub)
    }

    /// Create a P2P topic from the two participants' subscriptions. Each
    /// subscription records the other participant as its partner.
    pub fn create_p2p(&self, initiator: &mut Subscription, invited: &mut Subscription) -> Result<()> {
        initiator.init_times();
        initiator.set_touched_at(initiator.created_at);
        invited.init_times();
        invited.set_touched_at(invited.created_at);

        initiator.with = Some(invited.user);
        invited.with = Some(initiator.user);

        self.store.adapter().topic_create_p2p(initiator, invited)
    }

    pub fn get(&self, topic: &str) -> Result<Option<Topic>> {
        self.store.adapter().topic_get(topic)
    }

    /// Subscribers with their user data.
    pub fn get_users(&self, topic: &str, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.store.adapter().users_for_topic(topic, false, opts)
    }

    /// Like [`get_users`](Self::get_users), deleted subscriptions included.
    pub fn get_users_any(&self, topic: &str, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.store.adapter().users_for_topic(topic, true, opts)
    }

    /// Subscriptions only, no user data, deleted ones excluded.
    pub fn get_subs(&self, topic: &str, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.store.adapter().subs_for_topic(topic, false, opts)
    }

    /// Generic update. Always stamps `updated_at`.
    pub fn update(&self, topic: &str, mut update: TopicUpdate) -> Result<()> {
        update.updated_at = Some(time_now());
        self.store.adapter().topic_update(topic, &update)
    }

    /// Delete the topic: subscriptions first, then messages, then the topic
    /// row. Stops at the first failure; repeating the call finishes the job.
    pub fn delete(&self, topic: &str) -> Result<()> {
        let adapter = self.store.adapter();

        debug!("Deleting topic {}", topic);
        adapter.subs_del_for_topic(topic)?;
        adapter.message_delete_list(topic, None)?;
        adapter.topic_delete(topic)
    }
}
