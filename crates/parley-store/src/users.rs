use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use parley_types::{
    AccessMode, AuthRecord, Credential, QueryOpt, Subscription, Uid, User, UserUpdate, time_now,
};

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Persistence rules for users, their auth records and credentials.
pub struct Users<'a> {
    pub(crate) store: &'a Store,
}

impl Users<'_> {
    /// Assign an id, store the user and subscribe them to their own `me` and
    /// `fnd` topics.
    ///
    /// When the subscriptions cannot be created the user row is deleted on a
    /// best-effort basis and the subscription error is returned. A row left
    /// behind by a failed cleanup is harmless.
    pub fn create(&self, user: &mut User, private: Option<Value>) -> Result<()> {
        let adapter = self.store.adapter();

        user.id = self.store.get_uid()?;
        user.init_times();
        adapter.user_create(user)?;

        // `me` and `fnd` are implicit topics: only the subscriptions are stored.
        let mut bootstrap = [
            Subscription {
                topic: user.id.user_id(),
                user: user.id,
                mode_want: AccessMode::SELF,
                mode_given: AccessMode::SELF,
                private,
                ..Default::default()
            },
            Subscription {
                topic: user.id.fnd_name(),
                user: user.id,
                mode_want: AccessMode::SELF,
                mode_given: AccessMode::SELF,
                ..Default::default()
            },
        ];

        if let Err(err) = self.store.subs().create(&mut bootstrap) {
            if let Err(cleanup) = adapter.user_delete(user.id, false) {
                warn!("Failed to remove incomplete user {}: {}", user.id, cleanup);
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn get(&self, uid: Uid) -> Result<Option<User>> {
        self.store.adapter().user_get(uid)
    }

    pub fn get_all(&self, uids: &[Uid]) -> Result<Vec<User>> {
        self.store.adapter().user_get_all(uids)
    }

    /// Delete a user.
    ///
    /// A soft delete only flags the user row. A hard delete removes, in order,
    /// the user's subscriptions, auth records, credentials and the user row.
    /// Every step runs even if an earlier one fails; failures are only logged.
    /// Hard deletes are unfinished: the call always reports
    /// [`StoreError::NotImplemented`].
    pub fn delete(&self, uid: Uid, soft: bool) -> Result<()> {
        let adapter = self.store.adapter();
        if soft {
            return adapter.user_delete(uid, true);
        }

        debug!("Hard-deleting user {}", uid);
        // Topics owned by the user and their messages are left in place.
        let steps: [(&str, Result<()>); 4] = [
            ("subscriptions", adapter.subs_del_for_user(uid)),
            ("auth records", adapter.auth_del_all_records(uid).map(drop)),
            ("credentials", adapter.cred_del(uid, None)),
            ("user row", adapter.user_delete(uid, false)),
        ];
        for (what, res) in steps {
            if let Err(e) = res {
                warn!("Hard delete of user {}: failed to remove {}: {}", uid, what, e);
            }
        }

        Err(StoreError::NotImplemented)
    }

    /// Generic update. Always stamps `updated_at`.
    pub fn update(&self, uid: Uid, mut update: UserUpdate) -> Result<()> {
        update.updated_at = Some(time_now());
        self.store.adapter().user_update(uid, &update)
    }

    pub fn update_last_seen(&self, uid: Uid, user_agent: &str, when: DateTime<Utc>) -> Result<()> {
        let update = UserUpdate {
            last_seen: Some(when),
            user_agent: Some(user_agent.to_string()),
            ..Default::default()
        };
        self.store.adapter().user_update(uid, &update)
    }

    // -- Auth records --

    /// Auth record of the given scheme, with the scheme prefix removed from
    /// `unique`.
    pub fn get_auth_record(&self, uid: Uid, scheme: &str) -> Result<Option<AuthRecord>> {
        Ok(self
            .store
            .adapter()
            .auth_get_record(uid, scheme)?
            .map(strip_scheme))
    }

    /// Look up a record by its scheme-specific unique value.
    pub fn get_auth_unique_record(&self, scheme: &str, unique: &str) -> Result<Option<AuthRecord>> {
        Ok(self
            .store
            .adapter()
            .auth_get_unique_record(&namespaced(scheme, unique))?
            .map(strip_scheme))
    }

    /// [`StoreError::Duplicate`] when the unique value is already taken.
    pub fn add_auth_record(&self, rec: &AuthRecord) -> Result<()> {
        self.store.adapter().auth_add_record(&with_scheme(rec))
    }

    /// Replace the secret, level and expiration of an existing record.
    pub fn update_auth_record(&self, rec: &AuthRecord) -> Result<()> {
        self.store.adapter().auth_upd_record(&with_scheme(rec))
    }

    /// Delete the user's records of one scheme.
    pub fn del_auth_records(&self, uid: Uid, scheme: &str) -> Result<()> {
        self.store.adapter().auth_del_scheme(uid, scheme)
    }

    // -- Subscriptions and search --

    pub fn get_subs(&self, uid: Uid, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.store.adapter().subs_for_user(uid, false, opts)
    }

    /// Users and topics matching the tags, formatted as subscriptions.
    pub fn find_subs(&self, uid: Uid, required: &[String], optional: &[String]) -> Result<Vec<Subscription>> {
        let adapter = self.store.adapter();
        let mut found = adapter.find_users(uid, required, optional)?;
        found.extend(adapter.find_topics(required, optional)?);
        Ok(found)
    }

    /// Subscriptions with topic data, deleted topics excluded.
    pub fn get_topics(&self, uid: Uid, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.store.adapter().topics_for_user(uid, false, opts)
    }

    /// Same as [`get_topics`](Self::get_topics) but deleted topics are included.
    pub fn get_topics_any(&self, uid: Uid, opts: Option<&QueryOpt>) -> Result<Vec<Subscription>> {
        self.store.adapter().topics_for_user(uid, true, opts)
    }

    // -- Credentials --

    /// Save a credential validation request.
    pub fn save_cred(&self, cred: &mut Credential) -> Result<()> {
        cred.init_times();
        self.store.adapter().cred_add(cred)
    }

    pub fn confirm_cred(&self, uid: Uid, method: &str) -> Result<()> {
        self.store.adapter().cred_confirm(uid, method)
    }

    /// Count one failed validation attempt.
    pub fn fail_cred(&self, uid: Uid, method: &str) -> Result<()> {
        self.store.adapter().cred_fail(uid, method)
    }

    /// Confirmed credential for the method. `None` when there is none.
    pub fn get_cred(&self, uid: Uid, method: &str) -> Result<Option<Credential>> {
        Ok(self
            .store
            .adapter()
            .cred_get(uid, Some(method))?
            .into_iter()
            .next())
    }

    /// All confirmed credentials of the user.
    pub fn get_all_cred(&self, uid: Uid) -> Result<Vec<Credential>> {
        self.store.adapter().cred_get(uid, None)
    }

    pub fn del_cred(&self, uid: Uid, method: Option<&str>) -> Result<()> {
        self.store.adapter().cred_del(uid, method)
    }
}

fn namespaced(scheme: &str, unique: &str) -> String {
    format!("{}:{}", scheme, unique)
}

fn with_scheme(rec: &AuthRecord) -> AuthRecord {
    AuthRecord {
        unique: namespaced(&rec.scheme, &rec.unique),
        ..rec.clone()
    }
}

fn strip_scheme(mut rec: AuthRecord) -> AuthRecord {
    if let Some((_, unique)) = rec.unique.split_once(':') {
        rec.unique = unique.to_string();
    }
    rec
}
