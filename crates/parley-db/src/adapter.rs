use std::collections::HashMap;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::info;

use parley_store::{Adapter, Result, StoreError};
use parley_types::{
    AuthRecord, Credential, DelMessage, DeviceDef, FileDef, Message, QueryOpt, SubUpdate,
    Subscription, Topic, TopicUpdate, Uid, UploadStatus, User, UserUpdate,
};

use crate::migrations::{self, DB_VERSION};
use crate::queries::subs::Key;
use crate::queries::{auth, devices, files, messages, subs, topics, users};
use crate::{ADAPTER_NAME, Database};

impl Adapter for Database {
    // -- Lifecycle --

    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    fn open(&self, config: &str) -> Result<()> {
        self.connect(config)
    }

    fn close(&self) -> Result<()> {
        self.disconnect()
    }

    fn is_open(&self) -> bool {
        self.is_connected()
    }

    fn check_db_version(&self) -> Result<()> {
        let version = self.with_conn(migrations::version)?;
        if version != DB_VERSION {
            return Err(StoreError::Backend(anyhow!(
                "sqlite: schema version {} does not match expected {}",
                version,
                DB_VERSION
            )));
        }
        Ok(())
    }

    fn create_db(&self, reset: bool) -> Result<()> {
        self.with_tx(|tx| {
            if reset {
                migrations::drop_all(tx)?;
            }
            migrations::run(tx)
        })?;
        info!("Database schema created (reset: {})", reset);
        Ok(())
    }

    // -- Users --

    fn user_create(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| users::create(conn, user))
    }

    fn user_get(&self, uid: Uid) -> Result<Option<User>> {
        self.with_conn(|conn| users::get(conn, uid))
    }

    fn user_get_all(&self, uids: &[Uid]) -> Result<Vec<User>> {
        self.with_conn(|conn| users::get_all(conn, uids))
    }

    fn user_delete(&self, uid: Uid, soft: bool) -> Result<()> {
        self.with_conn(|conn| users::delete(conn, uid, soft))
    }

    fn user_update(&self, uid: Uid, update: &UserUpdate) -> Result<()> {
        self.with_conn(|conn| users::update(conn, uid, update))
    }

    // -- Auth records --

    fn auth_get_unique_record(&self, unique: &str) -> Result<Option<AuthRecord>> {
        self.with_conn(|conn| auth::get_unique(conn, unique))
    }

    fn auth_get_record(&self, uid: Uid, scheme: &str) -> Result<Option<AuthRecord>> {
        self.with_conn(|conn| auth::get(conn, uid, scheme))
    }

    fn auth_add_record(&self, rec: &AuthRecord) -> Result<()> {
        self.with_conn(|conn| auth::add(conn, rec))
    }

    fn auth_upd_record(&self, rec: &AuthRecord) -> Result<()> {
        self.with_conn(|conn| auth::update(conn, rec))
    }

    fn auth_del_scheme(&self, uid: Uid, scheme: &str) -> Result<()> {
        self.with_conn(|conn| auth::del_scheme(conn, uid, scheme))
    }

    fn auth_del_all_records(&self, uid: Uid) -> Result<usize> {
        self.with_conn(|conn| auth::del_all(conn, uid))
    }

    // -- Credentials --

    fn cred_add(&self, cred: &Credential) -> Result<()> {
        self.with_tx(|tx| auth::cred_add(tx, cred))
    }

    fn cred_confirm(&self, uid: Uid, method: &str) -> Result<()> {
        self.with_tx(|tx| auth::cred_confirm(tx, uid, method))
    }

    fn cred_fail(&self, uid: Uid, method: &str) -> Result<()> {
        self.with_conn(|conn| auth::cred_fail(conn, uid, method))
    }

    fn cred_get(&self, uid: Uid, method: Option<&str>) -> Result<Vec<Credential>> {
        self.with_conn(|conn| auth::cred_get(conn, uid, method))
    }

    fn cred_del(&self, uid: Uid, method: Option<&str>) -> Result<()> {
        self.with_conn(|conn| auth::cred_del(conn, uid, method))
    }

    // -- Topics --

    fn topic_create(&self, topic: &Topic) -> Result<()> {
        self.with_conn(|conn| topics::create(conn, topic))
    }

    fn topic_create_p2p(&self, initiator: &Subscription, invited: &Subscription) -> Result<()> {
        self.with_tx(|tx| topics::create_p2p(tx, initiator, invited))
    }

    fn topic_get(&self, topic: &str) -> Result<Option<Topic>> {
        self.with_conn(|conn| topics::get(conn, topic))
    }

    fn topics_for_user(&self, uid: Uid, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        // Group and p2p subscriptions need a live topic row; `me` and `fnd` have none.
        self.with_conn(|conn| {
            let found = subs::list(conn, Key::User(uid), "", keep_deleted, opts)?;
            let me = uid.user_id();
            let fnd = uid.fnd_name();
            let mut live = Vec::with_capacity(found.len());
            for mut sub in found {
                if sub.topic == me || sub.topic == fnd {
                    live.push(sub);
                    continue;
                }
                if let Some(topic) = topics::get(conn, &sub.topic)? {
                    if topic.deleted_at.is_none() || keep_deleted {
                        sub.touched_at = topic.touched_at.or(sub.touched_at);
                        live.push(sub);
                    }
                }
            }
            Ok(live)
        })
    }

    fn users_for_topic(&self, topic: &str, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        let join = if keep_deleted {
            "JOIN users u ON u.id = s.user_id"
        } else {
            "JOIN users u ON u.id = s.user_id AND u.state = 'ok'"
        };
        self.with_conn(|conn| subs::list(conn, Key::Topic(topic), join, keep_deleted, opts))
    }

    fn topic_share(&self, shares: &[Subscription]) -> Result<usize> {
        self.with_tx(|tx| subs::share(tx, shares))
    }

    fn topic_delete(&self, topic: &str) -> Result<()> {
        self.with_conn(|conn| topics::delete(conn, topic))
    }

    fn topic_update_on_message(&self, msg: &mut Message) -> Result<()> {
        let seq_id = self.with_tx(|tx| topics::update_on_message(tx, msg))?;
        msg.seq_id = seq_id;
        Ok(())
    }

    fn topic_update(&self, topic: &str, update: &TopicUpdate) -> Result<()> {
        self.with_conn(|conn| topics::update(conn, topic, update))
    }

    // -- Subscriptions --

    fn subscription_get(&self, topic: &str, user: Uid) -> Result<Option<Subscription>> {
        self.with_conn(|conn| subs::get(conn, topic, user))
    }

    fn subs_for_user(&self, user: Uid, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.with_conn(|conn| subs::list(conn, Key::User(user), "", keep_deleted, opts))
    }

    fn subs_for_topic(&self, topic: &str, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.with_conn(|conn| subs::list(conn, Key::Topic(topic), "", keep_deleted, opts))
    }

    fn subs_update(&self, topic: &str, user: Option<Uid>, update: &SubUpdate) -> Result<()> {
        self.with_conn(|conn| subs::update(conn, topic, user, update))
    }

    fn subs_delete(&self, topic: &str, user: Uid) -> Result<()> {
        self.with_conn(|conn| subs::delete(conn, topic, user))
    }

    fn subs_del_for_topic(&self, topic: &str) -> Result<()> {
        self.with_conn(|conn| subs::delete_for_topic(conn, topic))
    }

    fn subs_del_for_user(&self, user: Uid) -> Result<()> {
        self.with_conn(|conn| subs::delete_for_user(conn, user))
    }

    // -- Search --

    fn find_users(&self, uid: Uid, required: &[String], optional: &[String]) -> Result<Vec<Subscription>> {
        self.with_conn(|conn| users::find(conn, uid, required, optional))
    }

    fn find_topics(&self, required: &[String], optional: &[String]) -> Result<Vec<Subscription>> {
        self.with_conn(|conn| topics::find(conn, required, optional))
    }

    // -- Messages --

    fn message_save(&self, msg: &Message) -> Result<()> {
        self.with_conn(|conn| messages::save(conn, msg))
    }

    fn message_get_all(&self, topic: &str, for_user: Uid, opts: Option<&QueryOpt>) -> Result<Vec<Message>> {
        self.with_conn(|conn| messages::get_all(conn, topic, for_user, opts))
    }

    fn message_delete_list(&self, topic: &str, del: Option<&DelMessage>) -> Result<()> {
        self.with_tx(|tx| messages::delete_list(tx, topic, del))
    }

    fn message_get_deleted(&self, topic: &str, for_user: Uid, opts: Option<&QueryOpt>) -> Result<Vec<DelMessage>> {
        self.with_conn(|conn| messages::get_deleted(conn, topic, for_user, opts))
    }

    fn message_attachments(&self, msg: Uid, fids: &[Uid]) -> Result<()> {
        self.with_tx(|tx| messages::attachments(tx, msg, fids))
    }

    // -- Devices --

    fn device_upsert(&self, uid: Uid, dev: &DeviceDef) -> Result<()> {
        self.with_conn(|conn| devices::upsert(conn, uid, dev))
    }

    fn device_get_all(&self, uids: &[Uid]) -> Result<(HashMap<Uid, Vec<DeviceDef>>, usize)> {
        self.with_conn(|conn| devices::get_all(conn, uids))
    }

    fn device_delete(&self, uid: Uid, device_id: &str) -> Result<()> {
        self.with_conn(|conn| devices::delete(conn, uid, device_id))
    }

    // -- Files --

    fn file_start_upload(&self, fd: &FileDef) -> Result<()> {
        self.with_conn(|conn| files::start_upload(conn, fd))
    }

    fn file_finish_upload(&self, fid: Uid, status: UploadStatus, size: i64) -> Result<FileDef> {
        self.with_conn(|conn| files::finish_upload(conn, fid, status, size))
    }

    fn file_get(&self, fid: Uid) -> Result<Option<FileDef>> {
        self.with_conn(|conn| files::get(conn, fid))
    }

    fn file_find_unused(&self, older_than: DateTime<Utc>, limit: usize) -> Result<Vec<FileDef>> {
        self.with_conn(|conn| files::find_unused(conn, older_than, limit))
    }

    fn file_delete(&self, fids: &[Uid]) -> Result<()> {
        self.with_conn(|conn| files::delete(conn, fids))
    }
}
