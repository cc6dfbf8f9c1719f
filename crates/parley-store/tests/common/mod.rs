//! In-memory backend that records every call and can be told to fail.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use parley_store::{Adapter, MediaHandler, Registries, Result, Store, StoreConfig, StoreError};
use parley_types::{
    AuthRecord, Credential, DelMessage, DeviceDef, FileDef, Message, ObjState, QueryOpt, SubUpdate,
    Subscription, Topic, TopicUpdate, Uid, UploadStatus, User, UserUpdate, time_now,
};

pub const UID_KEY: &str = "la6YsO+bNX/+XIkOqc5Svw==";

#[derive(Default)]
struct State {
    users: HashMap<Uid, User>,
    auth: Vec<AuthRecord>,
    creds: Vec<Credential>,
    topics: HashMap<String, Topic>,
    subs: HashMap<(String, Uid), Subscription>,
    messages: Vec<Message>,
    dellog: Vec<DelMessage>,
    devices: HashMap<Uid, Vec<DeviceDef>>,
    files: HashMap<Uid, FileDef>,
    // file id -> messages linking it
    links: HashMap<Uid, Vec<Uid>>,
}

#[derive(Default)]
pub struct MemoryAdapter {
    open: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    state: Mutex<State>,
}

impl MemoryAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later call of `op` fail with a backend error.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().remove(op);
    }

    /// Names of the adapter methods called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    pub fn sub_count(&self) -> usize {
        self.state.lock().subs.len()
    }

    pub fn message_count(&self, topic: &str) -> usize {
        self.state.lock().messages.iter().filter(|m| m.topic == topic).count()
    }

    pub fn links_of(&self, fid: Uid) -> Vec<Uid> {
        self.state.lock().links.get(&fid).cloned().unwrap_or_default()
    }

    pub fn insert_del_message(&self, del: DelMessage) {
        self.state.lock().dellog.push(del);
    }

    pub fn set_file_created(&self, fid: Uid, at: DateTime<Utc>) {
        if let Some(fd) = self.state.lock().files.get_mut(&fid) {
            fd.created_at = at;
        }
    }

    fn call(&self, op: &'static str) -> Result<()> {
        self.calls.lock().push(op);
        if self.failing.lock().contains(op) {
            return Err(StoreError::Backend(anyhow::anyhow!("injected failure in {}", op)));
        }
        Ok(())
    }
}

fn page<T>(items: Vec<T>, opts: Option<&QueryOpt>) -> Vec<T> {
    match opts.and_then(|o| o.limit) {
        Some(limit) => items.into_iter().take(limit as usize).collect(),
        None => items,
    }
}

fn in_window(seq_id: i64, opts: Option<&QueryOpt>) -> bool {
    let Some(opts) = opts else { return true };
    opts.since.is_none_or(|since| seq_id >= since) && opts.before.is_none_or(|before| seq_id < before)
}

fn tags_match(tags: &[String], required: &[String], optional: &[String]) -> bool {
    required.iter().all(|t| tags.contains(t))
        && (optional.is_empty() || optional.iter().any(|t| tags.contains(t)))
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&self, _config: &str) -> Result<()> {
        self.call("open")?;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.call("close")?;
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn check_db_version(&self) -> Result<()> {
        self.call("check_db_version")
    }

    fn create_db(&self, reset: bool) -> Result<()> {
        self.call("create_db")?;
        if reset {
            *self.state.lock() = State::default();
        }
        Ok(())
    }

    // -- Users --

    fn user_create(&self, user: &User) -> Result<()> {
        self.call("user_create")?;
        let mut state = self.state.lock();
        if state.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    fn user_get(&self, uid: Uid) -> Result<Option<User>> {
        self.call("user_get")?;
        Ok(self.state.lock().users.get(&uid).cloned())
    }

    fn user_get_all(&self, uids: &[Uid]) -> Result<Vec<User>> {
        self.call("user_get_all")?;
        let state = self.state.lock();
        Ok(uids.iter().filter_map(|uid| state.users.get(uid).cloned()).collect())
    }

    fn user_delete(&self, uid: Uid, soft: bool) -> Result<()> {
        self.call("user_delete")?;
        let mut state = self.state.lock();
        if soft {
            if let Some(user) = state.users.get_mut(&uid) {
                user.state = ObjState::Deleted;
                user.deleted_at = Some(time_now());
            }
        } else {
            state.users.remove(&uid);
        }
        Ok(())
    }

    fn user_update(&self, uid: Uid, update: &UserUpdate) -> Result<()> {
        self.call("user_update")?;
        let mut state = self.state.lock();
        let user = state.users.get_mut(&uid).ok_or(StoreError::NotFound)?;
        if let Some(at) = update.updated_at {
            user.updated_at = at;
        }
        if let Some(s) = update.state {
            user.state = s;
        }
        if let Some(access) = update.access {
            user.access = access;
        }
        if let Some(public) = &update.public {
            user.public = Some(public.clone());
        }
        if let Some(tags) = &update.tags {
            user.tags = tags.clone();
        }
        if let Some(at) = update.last_seen {
            user.last_seen = Some(at);
        }
        if let Some(ua) = &update.user_agent {
            user.user_agent = ua.clone();
        }
        Ok(())
    }

    // -- Auth records --

    fn auth_get_unique_record(&self, unique: &str) -> Result<Option<AuthRecord>> {
        self.call("auth_get_unique_record")?;
        Ok(self.state.lock().auth.iter().find(|r| r.unique == unique).cloned())
    }

    fn auth_get_record(&self, uid: Uid, scheme: &str) -> Result<Option<AuthRecord>> {
        self.call("auth_get_record")?;
        Ok(self
            .state
            .lock()
            .auth
            .iter()
            .find(|r| r.user == uid && r.scheme == scheme)
            .cloned())
    }

    fn auth_add_record(&self, rec: &AuthRecord) -> Result<()> {
        self.call("auth_add_record")?;
        let mut state = self.state.lock();
        if state.auth.iter().any(|r| r.unique == rec.unique) {
            return Err(StoreError::Duplicate);
        }
        state.auth.push(rec.clone());
        Ok(())
    }

    fn auth_upd_record(&self, rec: &AuthRecord) -> Result<()> {
        self.call("auth_upd_record")?;
        let mut state = self.state.lock();
        let stored = state
            .auth
            .iter_mut()
            .find(|r| r.user == rec.user && r.scheme == rec.scheme)
            .ok_or(StoreError::NotFound)?;
        *stored = rec.clone();
        Ok(())
    }

    fn auth_del_scheme(&self, uid: Uid, scheme: &str) -> Result<()> {
        self.call("auth_del_scheme")?;
        self.state.lock().auth.retain(|r| !(r.user == uid && r.scheme == scheme));
        Ok(())
    }

    fn auth_del_all_records(&self, uid: Uid) -> Result<usize> {
        self.call("auth_del_all_records")?;
        let mut state = self.state.lock();
        let before = state.auth.len();
        state.auth.retain(|r| r.user != uid);
        Ok(before - state.auth.len())
    }

    // -- Credentials --

    fn cred_add(&self, cred: &Credential) -> Result<()> {
        self.call("cred_add")?;
        let mut state = self.state.lock();
        state
            .creds
            .retain(|c| !(c.user == cred.user && c.method == cred.method && !c.done));
        state.creds.push(cred.clone());
        Ok(())
    }

    fn cred_confirm(&self, uid: Uid, method: &str) -> Result<()> {
        self.call("cred_confirm")?;
        let mut state = self.state.lock();
        let cred = state
            .creds
            .iter_mut()
            .find(|c| c.user == uid && c.method == method && !c.done)
            .ok_or(StoreError::NotFound)?;
        cred.done = true;
        Ok(())
    }

    fn cred_fail(&self, uid: Uid, method: &str) -> Result<()> {
        self.call("cred_fail")?;
        let mut state = self.state.lock();
        if let Some(cred) = state
            .creds
            .iter_mut()
            .find(|c| c.user == uid && c.method == method && !c.done)
        {
            cred.retries += 1;
        }
        Ok(())
    }

    fn cred_get(&self, uid: Uid, method: Option<&str>) -> Result<Vec<Credential>> {
        self.call("cred_get")?;
        Ok(self
            .state
            .lock()
            .creds
            .iter()
            .filter(|c| c.user == uid && c.done && method.is_none_or(|m| c.method == m))
            .cloned()
            .collect())
    }

    fn cred_del(&self, uid: Uid, method: Option<&str>) -> Result<()> {
        self.call("cred_del")?;
        self.state
            .lock()
            .creds
            .retain(|c| !(c.user == uid && method.is_none_or(|m| c.method == m)));
        Ok(())
    }

    // -- Topics --

    fn topic_create(&self, topic: &Topic) -> Result<()> {
        self.call("topic_create")?;
        let mut state = self.state.lock();
        if state.topics.contains_key(&topic.name) {
            return Err(StoreError::Duplicate);
        }
        state.topics.insert(topic.name.clone(), topic.clone());
        Ok(())
    }

    fn topic_create_p2p(&self, initiator: &Subscription, invited: &Subscription) -> Result<()> {
        self.call("topic_create_p2p")?;
        let mut state = self.state.lock();
        if state.topics.contains_key(&initiator.topic) {
            return Err(StoreError::Duplicate);
        }
        let topic = Topic {
            name: initiator.topic.clone(),
            created_at: initiator.created_at,
            updated_at: initiator.updated_at,
            touched_at: initiator.touched_at,
            ..Default::default()
        };
        state.topics.insert(topic.name.clone(), topic);
        for sub in [initiator, invited] {
            state.subs.insert((sub.topic.clone(), sub.user), sub.clone());
        }
        Ok(())
    }

    fn topic_get(&self, topic: &str) -> Result<Option<Topic>> {
        self.call("topic_get")?;
        Ok(self.state.lock().topics.get(topic).cloned())
    }

    fn topics_for_user(&self, uid: Uid, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.call("topics_for_user")?;
        let state = self.state.lock();
        let mut subs: Vec<Subscription> = state
            .subs
            .values()
            .filter(|s| s.user == uid && (keep_deleted || s.deleted_at.is_none()))
            .cloned()
            .collect();
        subs.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(page(subs, opts))
    }

    fn users_for_topic(&self, topic: &str, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.call("users_for_topic")?;
        let state = self.state.lock();
        let mut subs: Vec<Subscription> = state
            .subs
            .values()
            .filter(|s| s.topic == topic && (keep_deleted || s.deleted_at.is_none()))
            .filter(|s| state.users.contains_key(&s.user))
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.user);
        Ok(page(subs, opts))
    }

    fn topic_share(&self, subs: &[Subscription]) -> Result<usize> {
        self.call("topic_share")?;
        let mut state = self.state.lock();
        for sub in subs {
            state.subs.insert((sub.topic.clone(), sub.user), sub.clone());
        }
        Ok(subs.len())
    }

    fn topic_delete(&self, topic: &str) -> Result<()> {
        self.call("topic_delete")?;
        self.state.lock().topics.remove(topic);
        Ok(())
    }

    fn topic_update_on_message(&self, msg: &mut Message) -> Result<()> {
        self.call("topic_update_on_message")?;
        let mut state = self.state.lock();
        let topic = state.topics.get_mut(&msg.topic).ok_or(StoreError::NotFound)?;
        topic.seq_id += 1;
        topic.touched_at = Some(msg.created_at);
        msg.seq_id = topic.seq_id;
        Ok(())
    }

    fn topic_update(&self, topic: &str, update: &TopicUpdate) -> Result<()> {
        self.call("topic_update")?;
        let mut state = self.state.lock();
        let topic = state.topics.get_mut(topic).ok_or(StoreError::NotFound)?;
        if let Some(at) = update.updated_at {
            topic.updated_at = at;
        }
        if let Some(at) = update.touched_at {
            topic.touched_at = Some(at);
        }
        if let Some(owner) = update.owner {
            topic.owner = owner;
        }
        if let Some(access) = update.access {
            topic.access = access;
        }
        if let Some(public) = &update.public {
            topic.public = Some(public.clone());
        }
        if let Some(tags) = &update.tags {
            topic.tags = tags.clone();
        }
        if let Some(del_id) = update.del_id {
            topic.del_id = del_id;
        }
        Ok(())
    }

    // -- Subscriptions --

    fn subscription_get(&self, topic: &str, user: Uid) -> Result<Option<Subscription>> {
        self.call("subscription_get")?;
        Ok(self.state.lock().subs.get(&(topic.to_string(), user)).cloned())
    }

    fn subs_for_user(&self, user: Uid, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.call("subs_for_user")?;
        let state = self.state.lock();
        let mut subs: Vec<Subscription> = state
            .subs
            .values()
            .filter(|s| s.user == user && (keep_deleted || s.deleted_at.is_none()))
            .cloned()
            .collect();
        subs.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(page(subs, opts))
    }

    fn subs_for_topic(&self, topic: &str, keep_deleted: bool, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.call("subs_for_topic")?;
        let state = self.state.lock();
        let mut subs: Vec<Subscription> = state
            .subs
            .values()
            .filter(|s| s.topic == topic && (keep_deleted || s.deleted_at.is_none()))
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.user);
        Ok(page(subs, opts))
    }

    fn subs_update(&self, topic: &str, user: Option<Uid>, update: &SubUpdate) -> Result<()> {
        self.call("subs_update")?;
        let mut state = self.state.lock();
        for sub in state
            .subs
            .values_mut()
            .filter(|s| s.topic == topic && user.is_none_or(|u| s.user == u))
        {
            if let Some(at) = update.updated_at {
                sub.updated_at = at;
            }
            if let Some(mode) = update.mode_want {
                sub.mode_want = mode;
            }
            if let Some(mode) = update.mode_given {
                sub.mode_given = mode;
            }
            if let Some(private) = &update.private {
                sub.private = Some(private.clone());
            }
            if let Some(del_id) = update.del_id {
                sub.del_id = del_id;
            }
            if let Some(seq) = update.recv_seq_id {
                sub.recv_seq_id = seq;
            }
            if let Some(seq) = update.read_seq_id {
                sub.read_seq_id = seq;
            }
        }
        Ok(())
    }

    fn subs_delete(&self, topic: &str, user: Uid) -> Result<()> {
        self.call("subs_delete")?;
        if let Some(sub) = self.state.lock().subs.get_mut(&(topic.to_string(), user)) {
            sub.deleted_at = Some(time_now());
        }
        Ok(())
    }

    fn subs_del_for_topic(&self, topic: &str) -> Result<()> {
        self.call("subs_del_for_topic")?;
        self.state.lock().subs.retain(|(t, _), _| t != topic);
        Ok(())
    }

    fn subs_del_for_user(&self, user: Uid) -> Result<()> {
        self.call("subs_del_for_user")?;
        self.state.lock().subs.retain(|(_, u), _| *u != user);
        Ok(())
    }

    // -- Search --

    fn find_users(&self, uid: Uid, required: &[String], optional: &[String]) -> Result<Vec<Subscription>> {
        self.call("find_users")?;
        let state = self.state.lock();
        let mut found: Vec<Subscription> = state
            .users
            .values()
            .filter(|u| u.id != uid && tags_match(&u.tags, required, optional))
            .map(|u| Subscription {
                topic: u.id.user_id(),
                user: uid,
                with: Some(u.id),
                ..Default::default()
            })
            .collect();
        found.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(found)
    }

    fn find_topics(&self, required: &[String], optional: &[String]) -> Result<Vec<Subscription>> {
        self.call("find_topics")?;
        let state = self.state.lock();
        let mut found: Vec<Subscription> = state
            .topics
            .values()
            .filter(|t| tags_match(&t.tags, required, optional))
            .map(|t| Subscription {
                topic: t.name.clone(),
                ..Default::default()
            })
            .collect();
        found.sort_by(|a, b| a.topic.cmp(&b.topic));
        Ok(found)
    }

    // -- Messages --

    fn message_save(&self, msg: &Message) -> Result<()> {
        self.call("message_save")?;
        self.state.lock().messages.push(msg.clone());
        Ok(())
    }

    fn message_get_all(&self, topic: &str, for_user: Uid, opts: Option<&QueryOpt>) -> Result<Vec<Message>> {
        self.call("message_get_all")?;
        let state = self.state.lock();
        let hidden = |seq_id: i64| {
            state.dellog.iter().any(|d| {
                d.topic == topic
                    && d.deleted_for == Some(for_user)
                    && d.seq_id_ranges.iter().any(|r| r.contains(seq_id))
            })
        };
        let mut msgs: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.topic == topic && in_window(m.seq_id, opts) && !hidden(m.seq_id))
            .cloned()
            .collect();
        msgs.sort_by_key(|m| std::cmp::Reverse(m.seq_id));
        Ok(page(msgs, opts))
    }

    fn message_delete_list(&self, topic: &str, del: Option<&DelMessage>) -> Result<()> {
        self.call("message_delete_list")?;
        let mut state = self.state.lock();
        match del {
            None => {
                state.messages.retain(|m| m.topic != topic);
                state.dellog.retain(|d| d.topic != topic);
            }
            Some(del) => {
                if del.deleted_for.is_none() {
                    state.messages.retain(|m| {
                        m.topic != topic || !del.seq_id_ranges.iter().any(|r| r.contains(m.seq_id))
                    });
                }
                state.dellog.push(del.clone());
            }
        }
        Ok(())
    }

    fn message_get_deleted(&self, topic: &str, for_user: Uid, _opts: Option<&QueryOpt>) -> Result<Vec<DelMessage>> {
        self.call("message_get_deleted")?;
        Ok(self
            .state
            .lock()
            .dellog
            .iter()
            .filter(|d| d.topic == topic && d.deleted_for.is_none_or(|u| u == for_user))
            .cloned()
            .collect())
    }

    fn message_attachments(&self, msg: Uid, fids: &[Uid]) -> Result<()> {
        self.call("message_attachments")?;
        let mut state = self.state.lock();
        for fid in fids {
            state.links.entry(*fid).or_default().push(msg);
        }
        Ok(())
    }

    // -- Devices --

    fn device_upsert(&self, uid: Uid, dev: &DeviceDef) -> Result<()> {
        self.call("device_upsert")?;
        let mut state = self.state.lock();
        let devices = state.devices.entry(uid).or_default();
        devices.retain(|d| d.device_id != dev.device_id);
        devices.push(dev.clone());
        Ok(())
    }

    fn device_get_all(&self, uids: &[Uid]) -> Result<(HashMap<Uid, Vec<DeviceDef>>, usize)> {
        self.call("device_get_all")?;
        let state = self.state.lock();
        let mut found = HashMap::new();
        let mut count = 0;
        for uid in uids {
            if let Some(devices) = state.devices.get(uid).filter(|d| !d.is_empty()) {
                count += devices.len();
                found.insert(*uid, devices.clone());
            }
        }
        Ok((found, count))
    }

    fn device_delete(&self, uid: Uid, device_id: &str) -> Result<()> {
        self.call("device_delete")?;
        if let Some(devices) = self.state.lock().devices.get_mut(&uid) {
            devices.retain(|d| d.device_id != device_id);
        }
        Ok(())
    }

    // -- Files --

    fn file_start_upload(&self, fd: &FileDef) -> Result<()> {
        self.call("file_start_upload")?;
        self.state.lock().files.insert(fd.id, fd.clone());
        Ok(())
    }

    fn file_finish_upload(&self, fid: Uid, status: UploadStatus, size: i64) -> Result<FileDef> {
        self.call("file_finish_upload")?;
        let mut state = self.state.lock();
        let fd = state.files.get_mut(&fid).ok_or(StoreError::NotFound)?;
        fd.status = status;
        fd.size = size;
        fd.updated_at = time_now();
        Ok(fd.clone())
    }

    fn file_get(&self, fid: Uid) -> Result<Option<FileDef>> {
        self.call("file_get")?;
        Ok(self.state.lock().files.get(&fid).cloned())
    }

    fn file_find_unused(&self, older_than: DateTime<Utc>, limit: usize) -> Result<Vec<FileDef>> {
        self.call("file_find_unused")?;
        let state = self.state.lock();
        let mut unused: Vec<FileDef> = state
            .files
            .values()
            .filter(|fd| fd.created_at < older_than && !state.links.contains_key(&fd.id))
            .cloned()
            .collect();
        unused.sort_by_key(|fd| fd.created_at);
        unused.truncate(limit);
        Ok(unused)
    }

    fn file_delete(&self, fids: &[Uid]) -> Result<()> {
        self.call("file_delete")?;
        let mut state = self.state.lock();
        for fid in fids {
            state.files.remove(fid);
        }
        Ok(())
    }
}

/// Media handler serving files as `/v0/file/s/<fid>`.
#[derive(Default)]
pub struct TestMedia {
    pub deleted: Mutex<Vec<Uid>>,
    pub fail_delete: AtomicBool,
}

pub const MEDIA_PREFIX: &str = "/v0/file/s/";

impl TestMedia {
    pub fn url(fid: Uid) -> String {
        format!("{}{}", MEDIA_PREFIX, fid)
    }
}

impl MediaHandler for TestMedia {
    fn init(&self, _config: &str) -> Result<()> {
        Ok(())
    }

    fn get_id_from_url(&self, url: &str) -> Uid {
        url.strip_prefix(MEDIA_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .unwrap_or(Uid::ZERO)
    }

    fn delete(&self, fids: &[Uid]) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::external(anyhow::anyhow!("blob store unavailable")));
        }
        self.deleted.lock().extend_from_slice(fids);
        Ok(())
    }
}

pub struct Harness {
    pub store: Store,
    pub adapter: Arc<MemoryAdapter>,
    pub media: Arc<TestMedia>,
}

pub fn config() -> StoreConfig {
    StoreConfig {
        uid_key: UID_KEY.to_string(),
        ..Default::default()
    }
}

/// Open a store over a fresh [`MemoryAdapter`] with [`TestMedia`] active.
pub fn harness() -> Harness {
    let adapter = MemoryAdapter::new();
    let media = Arc::new(TestMedia::default());

    let registries = Arc::new(Registries::new());
    registries.register_media_handler("test", media.clone()).unwrap();
    registries.use_media_handler("test", "").unwrap();

    let store = Store::open(adapter.clone(), 1, &config(), registries).unwrap();
    adapter.clear_calls();
    Harness { store, adapter, media }
}
