//! Storage contract every backend implements.
//!
//! Calls are synchronous and independent: nothing here promises atomicity
//! across two calls. Deletes must be idempotent, so that removing a row that
//! is already gone returns `Ok(())`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use parley_types::{
    AuthRecord, Credential, DelMessage, DeviceDef, FileDef, Message, QueryOpt, SubUpdate,
    Subscription, Topic, TopicUpdate, Uid, UploadStatus, User, UserUpdate,
};

use crate::error::Result;

pub trait Adapter: Send + Sync {
    // -- Lifecycle --

    /// Name used to select this backend's block in the store configuration.
    fn name(&self) -> &str;

    /// Connect using the backend's own configuration blob (may be empty).
    fn open(&self, config: &str) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Fails unless the database schema matches what this backend expects.
    fn check_db_version(&self) -> Result<()>;

    /// Create the schema, first dropping everything when `reset` is set.
    fn create_db(&self, reset: bool) -> Result<()>;

    // -- Users --

    fn user_create(&self, user: &User) -> Result<()>;

    fn user_get(&self, uid: Uid) -> Result<Option<User>>;

    fn user_get_all(&self, uids: &[Uid]) -> Result<Vec<User>>;

    /// Soft delete flags the row; hard delete removes it.
    fn user_delete(&self, uid: Uid, soft: bool) -> Result<()>;

    fn user_update(&self, uid: Uid, update: &UserUpdate) -> Result<()>;

    // -- Auth records --
    // `unique` is always the namespaced `scheme:value` form here.

    fn auth_get_unique_record(&self, unique: &str) -> Result<Option<AuthRecord>>;

    fn auth_get_record(&self, uid: Uid, scheme: &str) -> Result<Option<AuthRecord>>;

    /// [`StoreError::Duplicate`](crate::StoreError::Duplicate) when `unique` is taken.
    fn auth_add_record(&self, rec: &AuthRecord) -> Result<()>;

    fn auth_upd_record(&self, rec: &AuthRecord) -> Result<()>;

    fn auth_del_scheme(&self, uid: Uid, scheme: &str) -> Result<()>;

    /// Returns the number of records removed.
    fn auth_del_all_records(&self, uid: Uid) -> Result<usize>;

    // -- Credentials --

    fn cred_add(&self, cred: &Credential) -> Result<()>;

    fn cred_confirm(&self, uid: Uid, method: &str) -> Result<()>;

    /// Bump the fail counter of an unconfirmed credential.
    fn cred_fail(&self, uid: Uid, method: &str) -> Result<()>;

    /// Confirmed credentials of the user, optionally for one method only.
    fn cred_get(&self, uid: Uid, method: Option<&str>) -> Result<Vec<Credential>>;

    /// Delete credentials of one method, or all of them when `method` is `None`.
    fn cred_del(&self, uid: Uid, method: Option<&str>) -> Result<()>;

    // -- Topics --

    fn topic_create(&self, topic: &Topic) -> Result<()>;

    /// Create a P2P topic along with both participants' subscriptions.
    fn topic_create_p2p(&self, initiator: &Subscription, invited: &Subscription) -> Result<()>;

    fn topic_get(&self, topic: &str) -> Result<Option<Topic>>;

    /// Subscriptions of a user with topic data filled in.
    fn topics_for_user(&self, uid: Uid, keep_deleted: bool, opts: Option<&QueryOpt>)
    -> Result<Vec<Subscription>>;

    /// Subscriptions to a topic with user data filled in.
    fn users_for_topic(&self, topic: &str, keep_deleted: bool, opts: Option<&QueryOpt>)
    -> Result<Vec<Subscription>>;

    /// Create subscriptions in bulk. Returns how many were stored.
    fn topic_share(&self, subs: &[Subscription]) -> Result<usize>;

    fn topic_delete(&self, topic: &str) -> Result<()>;

    /// Bump the message counter of `msg.topic` and write the new value into
    /// `msg.seq_id`.
    fn topic_update_on_message(&self, msg: &mut Message) -> Result<()>;

    fn topic_update(&self, topic: &str, update: &TopicUpdate) -> Result<()>;

    // -- Subscriptions --

    fn subscription_get(&self, topic: &str, user: Uid) -> Result<Option<Subscription>>;

    fn subs_for_user(&self, user: Uid, keep_deleted: bool, opts: Option<&QueryOpt>)
    -> Result<Vec<Subscription>>;

    fn subs_for_topic(&self, topic: &str, keep_deleted: bool, opts: Option<&QueryOpt>)
    -> Result<Vec<Subscription>>;

    /// Update one subscription, or every subscription of the topic when
    /// `user` is `None`.
    fn subs_update(&self, topic: &str, user: Option<Uid>, update: &SubUpdate) -> Result<()>;

    fn subs_delete(&self, topic: &str, user: Uid) -> Result<()>;

    fn subs_del_for_topic(&self, topic: &str) -> Result<()>;

    fn subs_del_for_user(&self, user: Uid) -> Result<()>;

    // -- Search --

    /// Users matching the tags, formatted as subscriptions of `uid`.
    fn find_users(&self, uid: Uid, required: &[String], optional: &[String])
    -> Result<Vec<Subscription>>;

    fn find_topics(&self, required: &[String], optional: &[String]) -> Result<Vec<Subscription>>;

    // -- Messages --

    fn message_save(&self, msg: &Message) -> Result<()>;

    /// Messages visible to `for_user`: soft-deleted ones are left out.
    fn message_get_all(&self, topic: &str, for_user: Uid, opts: Option<&QueryOpt>)
    -> Result<Vec<Message>>;

    /// Delete messages and log the transaction.
    ///
    /// - `None` removes every message of the topic and its delete log.
    /// - A record without `deleted_for` removes the messages in its ranges
    ///   for everyone and stores the record.
    /// - A record with `deleted_for` only stores the record.
    fn message_delete_list(&self, topic: &str, del: Option<&DelMessage>) -> Result<()>;

    /// Delete records that apply to `for_user`: the user's own soft deletes
    /// and every hard delete.
    fn message_get_deleted(&self, topic: &str, for_user: Uid, opts: Option<&QueryOpt>)
    -> Result<Vec<DelMessage>>;

    /// Link uploaded files to a saved message.
    fn message_attachments(&self, msg: Uid, fids: &[Uid]) -> Result<()>;

    // -- Devices --

    fn device_upsert(&self, uid: Uid, dev: &DeviceDef) -> Result<()>;

    /// Devices per user, plus the total number of devices found.
    fn device_get_all(&self, uids: &[Uid]) -> Result<(HashMap<Uid, Vec<DeviceDef>>, usize)>;

    fn device_delete(&self, uid: Uid, device_id: &str) -> Result<()>;

    // -- Files --

    fn file_start_upload(&self, fd: &FileDef) -> Result<()>;

    /// [`StoreError::NotFound`](crate::StoreError::NotFound) when no such upload exists.
    fn file_finish_upload(&self, fid: Uid, status: UploadStatus, size: i64) -> Result<FileDef>;

    fn file_get(&self, fid: Uid) -> Result<Option<FileDef>>;

    /// Up to `limit` files created before `older_than` that no message links to.
    fn file_find_unused(&self, older_than: DateTime<Utc>, limit: usize) -> Result<Vec<FileDef>>;

    fn file_delete(&self, fids: &[Uid]) -> Result<()>;
}
