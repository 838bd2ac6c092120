//! Entity cache.
//!
//! One [`EntityMap`] per entity kind, each keyed by the entity's id.  Every
//! record sits behind its own mutex so a patch is atomic for readers of that
//! record, while unrelated records are updated concurrently.  Records are
//! replaced in place, never swapped out, so a patch that raced with an upsert
//! always lands on the live record.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::chat_list::{ChatList, OrderedChats};
use crate::errors::ConsistencyError;
use crate::types::{
    BasicGroup, BasicGroupFullInfo, Chat, ConnectionState, OptionValue, SecretChat, Supergroup,
    SupergroupFullInfo, User, UserFullInfo,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── EntityMap ────────────────────────────────────────────────────────────────

/// Id → record map with per-record locking.
pub struct EntityMap<K, V> {
    map: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Default for EntityMap<K, V> {
    fn default() -> Self {
        Self { map: RwLock::new(HashMap::new()) }
    }
}

impl<K: Eq + Hash + Copy, V: Clone> EntityMap<K, V> {
    pub fn new() -> Self { Self::default() }

    fn slot(&self, id: K) -> Option<Arc<Mutex<V>>> {
        self.map.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    /// Insert `value`, or replace the whole existing record.
    pub fn upsert(&self, id: K, value: V) {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        match map.get(&id) {
            Some(slot) => *lock(slot) = value,
            None       => { map.insert(id, Arc::new(Mutex::new(value))); }
        }
    }

    /// Apply `f` to the record if it exists.
    ///
    /// Unknown ids are not an error: the server may mention entities it has
    /// not announced yet.  Returns `None` in that case and creates nothing.
    pub fn patch<R>(&self, id: K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let slot = self.slot(id)?;
        let mut record = lock(&slot);
        Some(f(&mut record))
    }

    /// Snapshot of the record.
    pub fn get(&self, id: K) -> Option<V> {
        self.slot(id).map(|slot| lock(&slot).clone())
    }

    pub fn contains(&self, id: K) -> bool {
        self.map.read().unwrap_or_else(PoisonError::into_inner).contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl<K: Eq + Hash + Copy, V: Clone + Default> EntityMap<K, V> {
    /// Upsert where the write itself may fail.
    ///
    /// `apply` runs under the map's write lock and the record's lock, against
    /// the existing record or a `Default` one.  A fresh record is only
    /// published if `apply` succeeds.
    pub(crate) fn upsert_with<E>(
        &self,
        id:    K,
        apply: impl FnOnce(&mut V) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        match map.get(&id) {
            Some(slot) => apply(&mut lock(slot)),
            None => {
                let mut fresh = V::default();
                apply(&mut fresh)?;
                map.insert(id, Arc::new(Mutex::new(fresh)));
                Ok(())
            }
        }
    }
}

// ─── Store ────────────────────────────────────────────────────────────────────

/// Everything mirrored for one session.
#[derive(Default)]
pub struct Store {
    pub(crate) users:                  EntityMap<i32, User>,
    pub(crate) basic_groups:           EntityMap<i32, BasicGroup>,
    pub(crate) supergroups:            EntityMap<i32, Supergroup>,
    pub(crate) secret_chats:           EntityMap<i32, SecretChat>,
    pub(crate) chats:                  EntityMap<i64, Chat>,
    pub(crate) users_full_info:        EntityMap<i32, UserFullInfo>,
    pub(crate) basic_groups_full_info: EntityMap<i32, BasicGroupFullInfo>,
    pub(crate) supergroups_full_info:  EntityMap<i32, SupergroupFullInfo>,
    chat_list:                         ChatList,
    options:                           RwLock<HashMap<String, OptionValue>>,
    connection_state:                  Mutex<ConnectionState>,
}

impl Store {
    pub fn new() -> Self { Self::default() }

    // ── Chats ──────────────────────────────────────────────────────────────

    /// Insert or replace a chat, listing it at `chat.order`.
    ///
    /// A replaced chat is first taken off the list so the old key cannot
    /// linger next to the new one.
    pub fn insert_chat(&self, chat: Chat) -> Result<(), ConsistencyError> {
        let id = chat.id;
        self.chats.upsert_with(id, |current| {
            self.chat_list.set_order(current, 0)?;
            let order = chat.order;
            *current = Chat { order: 0, ..chat };
            self.chat_list.set_order(current, order)
        })
    }

    /// The only way to change a stored chat's order.
    ///
    /// Returns `Ok(false)` if the chat is unknown.
    pub fn set_chat_order(&self, chat_id: i64, order: u64) -> Result<bool, ConsistencyError> {
        self.patch_chat_ordered(chat_id, order, |_| {})
    }

    /// Patch a chat and move it to `order` in one critical section.
    pub(crate) fn patch_chat_ordered(
        &self,
        chat_id: i64,
        order:   u64,
        f:       impl FnOnce(&mut Chat),
    ) -> Result<bool, ConsistencyError> {
        match self.chats.patch(chat_id, |chat| {
            f(chat);
            self.chat_list.set_order(chat, order)
        }) {
            Some(result) => result.map(|()| true),
            None         => Ok(false),
        }
    }

    pub fn chat(&self, chat_id: i64) -> Option<Chat> { self.chats.get(chat_id) }

    pub fn chat_list(&self) -> &ChatList { &self.chat_list }

    /// Listed chat ids, highest order first.  See [`ChatList::iter`].
    pub fn ordered_chat_ids(&self) -> OrderedChats<'_> { self.chat_list.iter() }

    /// Up to `limit` listed chats, in list order.
    ///
    /// Chats are snapshotted one by one, so the result is only as consistent
    /// as [`Store::ordered_chat_ids`].
    pub fn main_chat_list(&self, limit: usize) -> Vec<Chat> {
        self.ordered_chat_ids()
            .filter_map(|id| self.chats.get(id))
            .take(limit)
            .collect()
    }

    // ── Other entities ─────────────────────────────────────────────────────

    pub fn user(&self, user_id: i32) -> Option<User> { self.users.get(user_id) }

    pub fn basic_group(&self, id: i32) -> Option<BasicGroup> { self.basic_groups.get(id) }

    pub fn supergroup(&self, id: i32) -> Option<Supergroup> { self.supergroups.get(id) }

    pub fn secret_chat(&self, id: i32) -> Option<SecretChat> { self.secret_chats.get(id) }

    pub fn user_full_info(&self, user_id: i32) -> Option<UserFullInfo> {
        self.users_full_info.get(user_id)
    }

    pub fn basic_group_full_info(&self, id: i32) -> Option<BasicGroupFullInfo> {
        self.basic_groups_full_info.get(id)
    }

    pub fn supergroup_full_info(&self, id: i32) -> Option<SupergroupFullInfo> {
        self.supergroups_full_info.get(id)
    }

    pub fn user_count(&self) -> usize { self.users.len() }

    /// Known chats, listed or not.
    pub fn chat_count(&self) -> usize { self.chats.len() }

    // ── Options & connection ───────────────────────────────────────────────

    pub(crate) fn set_option(&self, name: String, value: OptionValue) {
        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        if value == OptionValue::Empty {
            options.remove(&name);
        } else {
            options.insert(name, value);
        }
    }

    pub fn option(&self, name: &str) -> Option<OptionValue> {
        self.options.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        *lock(&self.connection_state) = state;
    }

    pub fn connection_state(&self) -> ConnectionState {
        *lock(&self.connection_state)
    }
}
