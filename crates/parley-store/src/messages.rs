use serde_json::Value;
use tracing::warn;

use parley_types::ranges::normalize;
use parley_types::{
    ATTACHMENTS_HEADER, DelMessage, Message, QueryOpt, Range, SubUpdate, TopicUpdate, Uid,
};

use crate::error::Result;
use crate::store::Store;

pub struct Messages<'a> {
    pub(crate) store: &'a Store,
}

impl Messages<'_> {
    /// Save a message and link the files it references.
    ///
    /// Steps: bump the topic's sequence counter (sets `msg.seq_id`), resolve
    /// attachment URLs in the header to file ids, store the message, link the
    /// files. The header field is rewritten to the resolved ids, or removed
    /// when none resolved. A failed link is logged and the message stays
    /// saved without links.
    pub fn save(&self, msg: &mut Message) -> Result<()> {
        let adapter = self.store.adapter();

        if msg.id.is_zero() {
            msg.id = self.store.get_uid()?;
        }
        msg.init_times();
        adapter.topic_update_on_message(msg)?;

        let attachments = self.resolve_attachments(msg);

        adapter.message_save(msg)?;

        if !attachments.is_empty() {
            if let Err(err) = adapter.message_attachments(msg.id, &attachments) {
                warn!(
                    "Failed to link {} attachment(s) to message {} in {}: {}",
                    attachments.len(),
                    msg.id,
                    msg.topic,
                    err
                );
            }
        }
        Ok(())
    }

    fn resolve_attachments(&self, msg: &mut Message) -> Vec<Uid> {
        let Some(header) = msg.head.get(ATTACHMENTS_HEADER) else {
            return Vec::new();
        };

        let media = self.store.registries().media_handler();
        let fids: Vec<Uid> = match (header, media) {
            (Value::Array(urls), Some(media)) => urls
                .iter()
                .filter_map(Value::as_str)
                .map(|url| media.get_id_from_url(url))
                .filter(|fid| !fid.is_zero())
                .collect(),
            _ => Vec::new(),
        };

        if fids.is_empty() {
            msg.head.remove(ATTACHMENTS_HEADER);
        } else {
            let ids = fids.iter().map(|fid| Value::String(fid.to_string())).collect();
            msg.head.insert(ATTACHMENTS_HEADER.to_string(), Value::Array(ids));
        }
        fids
    }

    /// Delete messages by sequence id ranges.
    ///
    /// With `del_id <= 0` every message of the topic is removed and nothing
    /// is logged. Otherwise a delete record is stored (soft, visible only to
    /// `for_user`, when one is given), then the topic's and the affected
    /// subscriptions' `del_id` are advanced. Hard deletes advance every
    /// subscription of the topic.
    pub fn delete_list(
        &self,
        topic: &str,
        del_id: i64,
        for_user: Option<Uid>,
        ranges: Vec<Range>,
    ) -> Result<()> {
        let adapter = self.store.adapter();

        if del_id <= 0 {
            return adapter.message_delete_list(topic, None);
        }

        let mut del = DelMessage {
            topic: topic.to_string(),
            deleted_for: for_user,
            del_id,
            seq_id_ranges: ranges,
            ..Default::default()
        };
        del.init_times();

        adapter.message_delete_list(topic, Some(&del))?;
        adapter.topic_update(topic, &TopicUpdate::del_id(del_id))?;
        adapter.subs_update(topic, for_user, &SubUpdate::del_id(del_id))
    }

    /// Messages of the topic, minus those `for_user` deleted for themselves.
    pub fn get_all(&self, topic: &str, for_user: Uid, opts: Option<&QueryOpt>) -> Result<Vec<Message>> {
        self.store.adapter().message_get_all(topic, for_user, opts)
    }

    /// Ranges of messages deleted for `for_user`, merged into a minimal
    /// ascending list, and the largest delete transaction id seen.
    pub fn get_deleted(
        &self,
        topic: &str,
        for_user: Uid,
        opts: Option<&QueryOpt>,
    ) -> Result<(Vec<Range>, i64)> {
        let dmsgs = self.store.adapter().message_get_deleted(topic, for_user, opts)?;

        let mut max_del_id = 0;
        let mut ranges = Vec::new();
        for dm in dmsgs {
            // Records with no ranges still count towards the max id.
            max_del_id = max_del_id.max(dm.del_id);
            ranges.extend(dm.seq_id_ranges);
        }
        normalize(&mut ranges);

        Ok((ranges, max_del_id))
    }
}
