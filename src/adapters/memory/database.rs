use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    application::{
        error::ApplicationError,
        repositories::{
            login_token_repository::LoginTokenRepository,
            one_time_token_repository::OneTimeTokenRepository, user_repository::UserRepository,
        },
        services::transaction::{Transaction, TransactionManager},
    },
    domain::models::{
        login_token::LoginToken,
        one_time_token::{OneTimeToken, OneTimeTokenKind},
        user::User,
    },
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    login_tokens: Vec<LoginToken>,
    one_time_tokens: HashMap<OneTimeTokenKind, Vec<OneTimeToken>>,
}

/// A row-level write, applied to the transaction's own view right away and
/// replayed against the shared tables on commit.
#[derive(Debug, Clone)]
enum Op {
    InsertUser(User),
    SetPasswordHash(Uuid, String),
    MarkVerified(Uuid),
    InsertLoginToken(LoginToken),
    ExpireLoginToken(Uuid, DateTime<Utc>),
    InsertOneTimeToken(OneTimeTokenKind, OneTimeToken),
    MarkUsed(OneTimeTokenKind, Uuid),
}

impl Tables {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::InsertUser(user) => {
                self.users.insert(user.id, user.clone());
            }
            Op::SetPasswordHash(user_id, hash) => {
                if let Some(user) = self.users.get_mut(user_id) {
                    user.password_hash = hash.clone();
                }
            }
            Op::MarkVerified(user_id) => {
                if let Some(user) = self.users.get_mut(user_id) {
                    user.is_verified = true;
                }
            }
            Op::InsertLoginToken(token) => self.login_tokens.push(token.clone()),
            Op::ExpireLoginToken(id, at) => {
                if let Some(row) = self.login_tokens.iter_mut().find(|t| t.id == *id) {
                    row.expires_at = *at;
                }
            }
            Op::InsertOneTimeToken(kind, token) => {
                self.one_time_tokens
                    .entry(*kind)
                    .or_default()
                    .push(token.clone());
            }
            Op::MarkUsed(kind, id) => {
                if let Some(row) = self.one_time_token_mut(*kind, *id) {
                    row.is_used = true;
                }
            }
        }
    }

    fn one_time_token(&self, kind: OneTimeTokenKind, id: Uuid) -> Option<&OneTimeToken> {
        self.one_time_tokens
            .get(&kind)
            .and_then(|rows| rows.iter().find(|t| t.id == id))
    }

    fn one_time_token_mut(&mut self, kind: OneTimeTokenKind, id: Uuid) -> Option<&mut OneTimeToken> {
        self.one_time_tokens
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|t| t.id == id))
    }

    fn has_email(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_write: bool,
    fail_next_commit: bool,
}

#[derive(Debug, Default)]
struct Counters {
    commits: usize,
    rollbacks: usize,
}

/// Row locks taken by `mark_used`, keyed by row id, valued by transaction id.
#[derive(Debug, Default)]
struct RowLocks {
    owners: HashMap<Uuid, u64>,
    next_tx: u64,
}

/// Relational stand-in. A transaction reads its own copy of the tables taken
/// at `begin`, records each write, and replays the writes on commit, so
/// overlapping transactions do not overwrite each other. Consuming a one-time
/// token locks its row until the transaction ends, like `UPDATE` does.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    locks: Arc<Mutex<RowLocks>>,
    faults: Arc<Mutex<Faults>>,
    counters: Arc<Mutex<Counters>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn fail_next_write(&self) {
        self.faults.lock().unwrap().fail_next_write = true;
    }

    pub fn fail_next_commit(&self) {
        self.faults.lock().unwrap().fail_next_commit = true;
    }

    pub fn commits(&self) -> usize {
        self.counters.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.lock().unwrap().rollbacks
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.tables().users.get(&user_id).cloned()
    }

    pub fn login_tokens_for(&self, user_id: Uuid) -> Vec<LoginToken> {
        self.tables()
            .login_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn insert_one_time_token(&self, kind: OneTimeTokenKind, token: OneTimeToken) {
        self.tables().apply(&Op::InsertOneTimeToken(kind, token));
    }

    fn take_write_fault(&self) -> Result<(), ApplicationError> {
        if std::mem::take(&mut self.faults.lock().unwrap().fail_next_write) {
            return Err(ApplicationError::DatabaseError(
                "injected write failure".to_string(),
            ));
        }
        Ok(())
    }

    fn open(tx: &mut dyn Transaction) -> Result<&mut MemoryTransaction, ApplicationError> {
        tx.as_any_mut()
            .downcast_mut::<MemoryTransaction>()
            .filter(|tx| tx.staged.is_some())
            .ok_or_else(|| {
                ApplicationError::InternalError(
                    "Transaction is not an open in-memory transaction".to_string(),
                )
            })
    }

    /// Resolves an open transaction of this store for a write, consuming an
    /// injected write failure if one is pending.
    fn writer<'a>(
        &self,
        tx: &'a mut dyn Transaction,
    ) -> Result<&'a mut MemoryTransaction, ApplicationError> {
        self.take_write_fault()?;
        Self::open(tx)
    }
}

pub struct MemoryTransaction {
    db: MemoryDatabase,
    id: u64,
    staged: Option<Tables>,
    ops: Vec<Op>,
}

impl MemoryTransaction {
    fn view(&mut self) -> &mut Tables {
        self.staged.get_or_insert_with(Tables::default)
    }

    fn record(&mut self, op: Op) {
        self.view().apply(&op);
        self.ops.push(op);
    }

    fn release_locks(&self) {
        self.db
            .locks
            .lock()
            .unwrap()
            .owners
            .retain(|_, owner| *owner != self.id);
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.release_locks();
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(&mut self) -> Result<(), ApplicationError> {
        if std::mem::take(&mut self.db.faults.lock().unwrap().fail_next_commit) {
            return Err(ApplicationError::DatabaseError(
                "injected commit failure".to_string(),
            ));
        }
        if self.staged.take().is_some() {
            {
                let mut tables = self.db.tables();
                for op in self.ops.drain(..) {
                    tables.apply(&op);
                }
            }
            self.db.counters.lock().unwrap().commits += 1;
        }
        self.release_locks();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ApplicationError> {
        if self.staged.take().is_some() {
            self.ops.clear();
            self.db.counters.lock().unwrap().rollbacks += 1;
        }
        self.release_locks();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl TransactionManager for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, ApplicationError> {
        let snapshot = self.tables().clone();
        let id = {
            let mut locks = self.locks.lock().unwrap();
            locks.next_tx += 1;
            locks.next_tx
        };
        Ok(Box::new(MemoryTransaction {
            db: self.clone(),
            id,
            staged: Some(snapshot),
            ops: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), ApplicationError> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApplicationError> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApplicationError> {
        Ok(self.tables().users.get(&user_id).cloned())
    }

    async fn create_user(
        &self,
        tx: &mut dyn Transaction,
        user: &User,
    ) -> Result<(), ApplicationError> {
        let open = self.writer(tx)?;
        if open.view().has_email(&user.email) || self.tables().has_email(&user.email) {
            return Err(ApplicationError::BadRequest(
                "Email is already registered".to_string(),
            ));
        }
        open.record(Op::InsertUser(user.clone()));
        Ok(())
    }

    async fn update_password_hash(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApplicationError> {
        let open = self.writer(tx)?;
        if !open.view().users.contains_key(&user_id) {
            return Err(ApplicationError::NotFound);
        }
        open.record(Op::SetPasswordHash(user_id, password_hash.to_string()));
        Ok(())
    }

    async fn mark_verified(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
    ) -> Result<(), ApplicationError> {
        let open = self.writer(tx)?;
        if !open.view().users.contains_key(&user_id) {
            return Err(ApplicationError::NotFound);
        }
        open.record(Op::MarkVerified(user_id));
        Ok(())
    }
}

#[async_trait]
impl LoginTokenRepository for MemoryDatabase {
    async fn get_active(&self, token_value: &str) -> Result<Option<LoginToken>, ApplicationError> {
        let now = Utc::now();
        Ok(self
            .tables()
            .login_tokens
            .iter()
            .find(|t| t.token_value == token_value && t.is_active_at(now))
            .cloned())
    }

    async fn create(
        &self,
        tx: &mut dyn Transaction,
        token: &LoginToken,
    ) -> Result<(), ApplicationError> {
        self.writer(tx)?
            .record(Op::InsertLoginToken(token.clone()));
        Ok(())
    }

    async fn revoke(
        &self,
        tx: &mut dyn Transaction,
        token: &LoginToken,
    ) -> Result<(), ApplicationError> {
        self.writer(tx)?
            .record(Op::ExpireLoginToken(token.id, Utc::now()));
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        tx: &mut dyn Transaction,
        user_id: Uuid,
    ) -> Result<u64, ApplicationError> {
        let now = Utc::now();
        let open = self.writer(tx)?;
        let active: Vec<Uuid> = open
            .view()
            .login_tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.is_active_at(now))
            .map(|t| t.id)
            .collect();
        for id in &active {
            open.record(Op::ExpireLoginToken(*id, now));
        }
        Ok(active.len() as u64)
    }
}

/// One table of single-use tokens inside a [`MemoryDatabase`].
pub struct MemoryOneTimeTokens {
    db: MemoryDatabase,
    kind: OneTimeTokenKind,
}

impl MemoryOneTimeTokens {
    pub fn new(db: MemoryDatabase, kind: OneTimeTokenKind) -> Self {
        Self { db, kind }
    }
}

#[async_trait]
impl OneTimeTokenRepository for MemoryOneTimeTokens {
    fn kind(&self) -> OneTimeTokenKind {
        self.kind
    }

    async fn get_active(
        &self,
        token_value: &str,
    ) -> Result<Option<OneTimeToken>, ApplicationError> {
        let now = Utc::now();
        Ok(self
            .db
            .tables()
            .one_time_tokens
            .get(&self.kind)
            .and_then(|rows| {
                rows.iter()
                    .find(|t| t.token_value == token_value && t.is_active_at(now))
            })
            .cloned())
    }

    async fn create(
        &self,
        tx: &mut dyn Transaction,
        token: &OneTimeToken,
    ) -> Result<(), ApplicationError> {
        self.db
            .writer(tx)?
            .record(Op::InsertOneTimeToken(self.kind, token.clone()));
        Ok(())
    }

    /// Waits while another open transaction holds the row, then decides on the
    /// committed value, the same as `UPDATE .. WHERE is_used = FALSE`.
    async fn mark_used(
        &self,
        tx: &mut dyn Transaction,
        token: &OneTimeToken,
    ) -> Result<bool, ApplicationError> {
        self.db.take_write_fault()?;
        loop {
            let open = MemoryDatabase::open(tx)?;
            let unused_here = open
                .view()
                .one_time_token(self.kind, token.id)
                .is_some_and(|row| !row.is_used);
            if !unused_here {
                return Ok(false);
            }

            let acquired = {
                let mut locks = self.db.locks.lock().unwrap();
                match locks.owners.get(&token.id) {
                    Some(owner) if *owner != open.id => false,
                    _ => {
                        locks.owners.insert(token.id, open.id);
                        true
                    }
                }
            };

            if acquired {
                let used_elsewhere = self
                    .db
                    .tables()
                    .one_time_token(self.kind, token.id)
                    .is_some_and(|row| row.is_used);
                if used_elsewhere {
                    return Ok(false);
                }
                open.record(Op::MarkUsed(self.kind, token.id));
                return Ok(true);
            }

            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::services::credentials::generate_token;

    fn reset_tokens(db: &MemoryDatabase) -> (MemoryOneTimeTokens, OneTimeToken) {
        let repo = MemoryOneTimeTokens::new(db.clone(), OneTimeTokenKind::PasswordReset);
        let row = OneTimeToken::issue(Uuid::new_v4(), &generate_token(Duration::from_secs(60)));
        db.insert_one_time_token(OneTimeTokenKind::PasswordReset, row.clone());
        (repo, row)
    }

    #[tokio::test]
    async fn token_consumed_by_an_overlapping_transaction_cannot_be_consumed_again() {
        let db = MemoryDatabase::new();
        let (repo, row) = reset_tokens(&db);

        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();

        assert!(repo.mark_used(&mut *first, &row).await.unwrap());
        first.commit().await.unwrap();

        assert!(!repo.mark_used(&mut *second, &row).await.unwrap());
        second.commit().await.unwrap();
        assert!(repo.get_active(&row.token_value).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_consumer_waits_for_the_first_to_finish() {
        let db = MemoryDatabase::new();
        let (repo, row) = reset_tokens(&db);

        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();
        assert!(repo.mark_used(&mut *first, &row).await.unwrap());

        let (consumed, committed) = tokio::join!(repo.mark_used(&mut *second, &row), async {
            tokio::task::yield_now().await;
            first.commit().await
        });

        committed.unwrap();
        assert!(!consumed.unwrap());
    }

    #[tokio::test]
    async fn rolled_back_consumer_frees_the_token() {
        let db = MemoryDatabase::new();
        let (repo, row) = reset_tokens(&db);

        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();
        assert!(repo.mark_used(&mut *first, &row).await.unwrap());
        first.rollback().await.unwrap();

        assert!(repo.mark_used(&mut *second, &row).await.unwrap());
        second.commit().await.unwrap();
        assert!(repo.get_active(&row.token_value).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overlapping_commits_keep_each_others_rows() {
        let db = MemoryDatabase::new();
        let user_id = Uuid::new_v4();
        let a = LoginToken::issue(user_id, &generate_token(Duration::from_secs(60)));
        let b = LoginToken::issue(user_id, &generate_token(Duration::from_secs(60)));

        let mut first = db.begin().await.unwrap();
        let mut second = db.begin().await.unwrap();
        db.create(&mut *first, &a).await.unwrap();
        db.create(&mut *second, &b).await.unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        assert_eq!(db.login_tokens_for(user_id).len(), 2);
        assert_eq!(db.commits(), 2);
    }
}
