//! Ordered chat list.
//!
//! The list stores `(order, chat_id)` keys only, sorted by descending order
//! and then descending chat id.  Chats with `order == 0` are not listed.
//!
//! The key is derived from [`Chat::order`], which is mutable, so every change
//! of that field must go through [`ChatList::set_order`]: remove the old key,
//! assign, insert the new key, all under the list lock.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::ConsistencyError;
use crate::types::Chat;

// ─── OrderedChat ──────────────────────────────────────────────────────────────

/// Sort key of one listed chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderedChat {
    pub order:   u64,
    pub chat_id: i64,
}

impl Ord for OrderedChat {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: the set's natural iteration order is the display order.
        other.order.cmp(&self.order)
            .then_with(|| other.chat_id.cmp(&self.chat_id))
    }
}

impl PartialOrd for OrderedChat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ─── ChatList ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ChatList {
    keys: Mutex<BTreeSet<OrderedChat>>,
}

impl ChatList {
    pub fn new() -> Self { Self::default() }

    fn keys(&self) -> MutexGuard<'_, BTreeSet<OrderedChat>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `chat` to `order` in the list.
    ///
    /// The caller must hold the chat's own lock, so that the stored order and
    /// the listed key cannot be changed from elsewhere in between.
    pub(crate) fn set_order(&self, chat: &mut Chat, order: u64) -> Result<(), ConsistencyError> {
        let mut keys = self.keys();
        if chat.order != 0 {
            let old = OrderedChat { order: chat.order, chat_id: chat.id };
            if !keys.remove(&old) {
                return Err(ConsistencyError::MissingKey { chat_id: chat.id, order: chat.order });
            }
        }
        chat.order = order;
        if order != 0 {
            let new = OrderedChat { order, chat_id: chat.id };
            if !keys.insert(new) {
                return Err(ConsistencyError::DuplicateKey { chat_id: chat.id, order });
            }
        }
        Ok(())
    }

    /// Number of listed chats.
    pub fn len(&self) -> usize { self.keys().len() }

    pub fn is_empty(&self) -> bool { self.keys().is_empty() }

    /// Copy of every key, in list order.
    pub fn snapshot(&self) -> Vec<OrderedChat> {
        self.keys().iter().copied().collect()
    }

    /// Lazily walk listed chat ids in list order.
    ///
    /// Each step takes the lock briefly and resumes after the last key
    /// returned, so the walk never blocks writers for long.  Chats moved
    /// while walking may be seen twice or not at all; call again to restart.
    pub fn iter(&self) -> OrderedChats<'_> {
        OrderedChats { list: self, last: None }
    }
}

/// Iterator returned by [`ChatList::iter`].
pub struct OrderedChats<'a> {
    list: &'a ChatList,
    last: Option<OrderedChat>,
}

impl Iterator for OrderedChats<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let keys = self.list.keys();
        let next = match self.last {
            None       => keys.iter().next().copied(),
            Some(last) => keys.range((Bound::Excluded(last), Bound::Unbounded)).next().copied(),
        }?;
        self.last = Some(next);
        Some(next.chat_id)
    }
}
