//! Inbound updates and the dispatcher that applies them.
//!
//! Every event the transport delivers is one variant of [`Update`].  Kinds
//! the transport could not map arrive as [`Update::Raw`] and are ignored.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::auth::{AuthInput, AuthorizationState};
use crate::cache::Store;
use crate::errors::ConsistencyError;
use crate::types::{
    BasicGroup, BasicGroupFullInfo, Chat, ChatPhoto, ConnectionState, DraftMessage, Message,
    NotificationSettings, NotificationSettingsScope, OptionValue, SecretChat, Supergroup,
    SupergroupFullInfo, User, UserFullInfo, UserStatus,
};

// ─── Update ───────────────────────────────────────────────────────────────────

/// An event pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Update {
    AuthorizationState(AuthorizationState),

    /// A user was seen for the first time or changed; carries the full record.
    User(User),
    UserStatus { user_id: i32, status: UserStatus },
    BasicGroup(BasicGroup),
    Supergroup(Supergroup),
    SecretChat(SecretChat),

    /// A chat was seen for the first time; carries the full record.
    NewChat(Chat),
    ChatTitle { chat_id: i64, title: String },
    ChatPhoto { chat_id: i64, photo: Option<ChatPhoto> },
    ChatLastMessage { chat_id: i64, last_message: Option<Message>, order: u64 },
    ChatOrder { chat_id: i64, order: u64 },
    ChatIsPinned { chat_id: i64, is_pinned: bool, order: u64 },
    ChatReadInbox { chat_id: i64, last_read_inbox_message_id: i64, unread_count: i32 },
    ChatReadOutbox { chat_id: i64, last_read_outbox_message_id: i64 },
    ChatUnreadMentionCount { chat_id: i64, unread_mention_count: i32 },
    MessageMentionRead { chat_id: i64, message_id: i64, unread_mention_count: i32 },
    ChatReplyMarkup { chat_id: i64, reply_markup_message_id: i64 },
    ChatDraftMessage { chat_id: i64, draft_message: Option<DraftMessage>, order: u64 },
    NotificationSettings { scope: NotificationSettingsScope, notification_settings: NotificationSettings },

    UserFullInfo { user_id: i32, user_full_info: UserFullInfo },
    BasicGroupFullInfo { basic_group_id: i32, basic_group_full_info: BasicGroupFullInfo },
    SupergroupFullInfo { supergroup_id: i32, supergroup_full_info: SupergroupFullInfo },

    Option { name: String, value: OptionValue },
    ConnectionState(ConnectionState),
    NewMessage(Message),
    DeleteMessages { chat_id: i64, message_ids: Vec<i64>, is_permanent: bool, from_cache: bool },

    /// An update kind without a dedicated variant.
    Raw { constructor_id: u32 },
}

impl Update {
    /// Short name of the update kind, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthorizationState(_)         => "updateAuthorizationState",
            Self::User(_)                       => "updateUser",
            Self::UserStatus { .. }             => "updateUserStatus",
            Self::BasicGroup(_)                 => "updateBasicGroup",
            Self::Supergroup(_)                 => "updateSupergroup",
            Self::SecretChat(_)                 => "updateSecretChat",
            Self::NewChat(_)                    => "updateNewChat",
            Self::ChatTitle { .. }              => "updateChatTitle",
            Self::ChatPhoto { .. }              => "updateChatPhoto",
            Self::ChatLastMessage { .. }        => "updateChatLastMessage",
            Self::ChatOrder { .. }              => "updateChatOrder",
            Self::ChatIsPinned { .. }           => "updateChatIsPinned",
            Self::ChatReadInbox { .. }          => "updateChatReadInbox",
            Self::ChatReadOutbox { .. }         => "updateChatReadOutbox",
            Self::ChatUnreadMentionCount { .. } => "updateChatUnreadMentionCount",
            Self::MessageMentionRead { .. }     => "updateMessageMentionRead",
            Self::ChatReplyMarkup { .. }        => "updateChatReplyMarkup",
            Self::ChatDraftMessage { .. }       => "updateChatDraftMessage",
            Self::NotificationSettings { .. }   => "updateNotificationSettings",
            Self::UserFullInfo { .. }           => "updateUserFullInfo",
            Self::BasicGroupFullInfo { .. }     => "updateBasicGroupFullInfo",
            Self::SupergroupFullInfo { .. }     => "updateSupergroupFullInfo",
            Self::Option { .. }                 => "updateOption",
            Self::ConnectionState(_)            => "updateConnectionState",
            Self::NewMessage(_)                 => "updateNewMessage",
            Self::DeleteMessages { .. }         => "updateDeleteMessages",
            Self::Raw { .. }                    => "raw",
        }
    }
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

/// Routes each update to the auth task or to the store.
///
/// Never blocks: auth updates are queued for the auth task, everything else
/// is a short critical section in the store.
pub(crate) struct Dispatcher {
    store: Arc<Store>,
    auth:  mpsc::UnboundedSender<AuthInput>,
}

impl Dispatcher {
    pub(crate) fn new(store: Arc<Store>, auth: mpsc::UnboundedSender<AuthInput>) -> Self {
        Self { store, auth }
    }

    /// Hand a failed handshake request to the auth task.
    pub(crate) fn forward_auth(&self, input: AuthInput) {
        if self.auth.send(input).is_err() {
            tracing::debug!("[mirror] auth task gone, dropping auth input");
        }
    }

    pub(crate) fn dispatch(&self, update: Update) -> Result<(), ConsistencyError> {
        tracing::trace!("[mirror] << {}", update.name());
        let store = &*self.store;

        match update {
            Update::AuthorizationState(state) => self.forward_auth(AuthInput::State(state)),

            Update::User(user) => {
                tracing::debug!(
                    "[mirror] << user {} {} (@{}) ({})",
                    user.id, user.full_name(), user.username, user.phone_number,
                );
                store.users.upsert(user.id, user);
            }
            Update::UserStatus { user_id, status } => {
                store.users.patch(user_id, |u| u.status = status);
            }
            Update::BasicGroup(group) => store.basic_groups.upsert(group.id, group),
            Update::Supergroup(group) => {
                tracing::debug!("[mirror] << supergroup {} (@{})", group.id, group.username);
                store.supergroups.upsert(group.id, group);
            }
            Update::SecretChat(chat) => store.secret_chats.upsert(chat.id, chat),

            Update::NewChat(chat) => {
                tracing::debug!("[mirror] << new chat {} {:?} order={}", chat.id, chat.title, chat.order);
                store.insert_chat(chat)?;
            }
            Update::ChatTitle { chat_id, title } => {
                store.chats.patch(chat_id, |c| c.title = title);
            }
            Update::ChatPhoto { chat_id, photo } => {
                store.chats.patch(chat_id, |c| c.photo = photo);
            }
            Update::ChatLastMessage { chat_id, last_message, order } => {
                store.patch_chat_ordered(chat_id, order, |c| c.last_message = last_message)?;
            }
            Update::ChatOrder { chat_id, order } => {
                store.set_chat_order(chat_id, order)?;
            }
            Update::ChatIsPinned { chat_id, is_pinned, order } => {
                store.patch_chat_ordered(chat_id, order, |c| c.is_pinned = is_pinned)?;
            }
            Update::ChatReadInbox { chat_id, last_read_inbox_message_id, unread_count } => {
                store.chats.patch(chat_id, |c| {
                    c.last_read_inbox_message_id = last_read_inbox_message_id;
                    c.unread_count               = unread_count;
                });
            }
            Update::ChatReadOutbox { chat_id, last_read_outbox_message_id } => {
                store.chats.patch(chat_id, |c| c.last_read_outbox_message_id = last_read_outbox_message_id);
            }
            Update::ChatUnreadMentionCount { chat_id, unread_mention_count }
            | Update::MessageMentionRead { chat_id, unread_mention_count, .. } => {
                store.chats.patch(chat_id, |c| c.unread_mention_count = unread_mention_count);
            }
            Update::ChatReplyMarkup { chat_id, reply_markup_message_id } => {
                store.chats.patch(chat_id, |c| c.reply_markup_message_id = reply_markup_message_id);
            }
            Update::ChatDraftMessage { chat_id, draft_message, order } => {
                store.patch_chat_ordered(chat_id, order, |c| c.draft_message = draft_message)?;
            }
            Update::NotificationSettings { scope, notification_settings } => match scope {
                NotificationSettingsScope::Chat { chat_id } => {
                    store.chats.patch(chat_id, |c| c.notification_settings = notification_settings);
                }
                other => tracing::debug!("[mirror] << notification settings for {other:?} ignored"),
            },

            Update::UserFullInfo { user_id, user_full_info } => {
                store.users_full_info.upsert(user_id, user_full_info);
            }
            Update::BasicGroupFullInfo { basic_group_id, basic_group_full_info } => {
                store.basic_groups_full_info.upsert(basic_group_id, basic_group_full_info);
            }
            Update::SupergroupFullInfo { supergroup_id, supergroup_full_info } => {
                store.supergroups_full_info.upsert(supergroup_id, supergroup_full_info);
            }

            Update::Option { name, value } => {
                tracing::debug!("[mirror] << option {name} = {value:?}");
                store.set_option(name, value);
            }
            Update::ConnectionState(state) => {
                tracing::info!("[mirror] connection state: {state:?}");
                store.set_connection_state(state);
            }
            Update::NewMessage(message) => {
                tracing::debug!("[mirror] << new message {} in chat {}", message.id, message.chat_id);
            }
            Update::DeleteMessages { chat_id, message_ids, .. } => {
                tracing::debug!("[mirror] << {} messages deleted in chat {chat_id}", message_ids.len());
            }
            Update::Raw { constructor_id } => {
                tracing::trace!("[mirror] ignoring update {constructor_id:#010x}");
            }
        }
        Ok(())
    }
}
