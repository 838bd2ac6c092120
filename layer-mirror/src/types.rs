//! Mirrored entity types.
//!
//! These are plain data records.  They are owned by [`crate::cache::Store`];
//! callers only ever see cloned snapshots.

// ─── Users ────────────────────────────────────────────────────────────────────

/// Online status of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UserStatus {
    /// The user status was never changed.
    #[default]
    Empty,
    /// Online until the given Unix timestamp.
    Online { expires: i32 },
    /// Offline since the given Unix timestamp.
    Offline { was_online: i32 },
    Recently,
    LastWeek,
    LastMonth,
}

/// Kind of user account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UserType {
    #[default]
    Regular,
    Deleted,
    Bot { can_join_groups: bool, is_inline: bool },
    Unknown,
}

/// A user as last announced by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id:            i32,
    pub first_name:    String,
    pub last_name:     String,
    pub username:      String,
    pub phone_number:  String,
    pub status:        UserStatus,
    pub is_contact:    bool,
    pub is_verified:   bool,
    pub language_code: String,
    pub kind:          UserType,
}

impl User {
    /// `"First Last"`, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Supplementary information about a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserFullInfo {
    pub is_blocked:            bool,
    pub can_be_called:         bool,
    pub has_private_calls:     bool,
    pub bio:                   String,
    pub share_text:            String,
    pub group_in_common_count: i32,
    pub bot_info:              Option<String>,
}

// ─── Groups ───────────────────────────────────────────────────────────────────

/// Our membership in a group or channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChatMemberStatus {
    Creator { is_member: bool },
    Administrator,
    #[default]
    Member,
    Restricted { is_member: bool, restricted_until_date: i32 },
    Left,
    Banned { banned_until_date: i32 },
}

/// A basic group (up to a couple of hundred members).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicGroup {
    pub id:                        i32,
    pub member_count:              i32,
    pub status:                    ChatMemberStatus,
    pub everyone_is_administrator: bool,
    pub is_active:                 bool,
    /// Non-zero once the group was upgraded to a supergroup.
    pub upgraded_to_supergroup_id: i32,
}

/// Supplementary information about a basic group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasicGroupFullInfo {
    pub description:     String,
    pub creator_user_id: i32,
    pub member_user_ids: Vec<i32>,
    pub invite_link:     String,
}

/// A supergroup or channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Supergroup {
    pub id:            i32,
    pub username:      String,
    pub date:          i32,
    pub status:        ChatMemberStatus,
    pub member_count:  i32,
    pub sign_messages: bool,
    pub is_channel:    bool,
    pub is_verified:   bool,
}

/// Supplementary information about a supergroup or channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupergroupFullInfo {
    pub description:                  String,
    pub member_count:                 i32,
    pub administrator_count:          i32,
    pub restricted_count:             i32,
    pub banned_count:                 i32,
    pub can_get_members:              bool,
    pub can_set_username:             bool,
    pub invite_link:                  String,
    pub pinned_message_id:            i64,
    pub upgraded_from_basic_group_id: i32,
}

// ─── Secret chats ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecretChatState {
    #[default]
    Pending,
    Ready,
    Closed,
}

/// An end-to-end encrypted chat with a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SecretChat {
    pub id:          i32,
    pub user_id:     i32,
    pub state:       SecretChatState,
    pub is_outbound: bool,
    pub ttl:         i32,
    pub key_hash:    Vec<u8>,
    pub layer:       i32,
}

// ─── Chats ────────────────────────────────────────────────────────────────────

/// What a chat is backed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChatType {
    #[default]
    Private,
    BasicGroup { basic_group_id: i32 },
    Supergroup { supergroup_id: i32, is_channel: bool },
    Secret { secret_chat_id: i32, user_id: i32 },
}

/// Small and big chat photo file ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChatPhoto {
    pub small_file_id: i32,
    pub big_file_id:   i32,
}

/// Summary of a message, enough to render a chat list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    pub id:             i64,
    pub chat_id:        i64,
    pub sender_user_id: i32,
    pub date:           i32,
    pub is_outgoing:    bool,
    /// Text or caption; empty for content without text.
    pub text:           String,
}

/// Unsent draft kept by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DraftMessage {
    pub reply_to_message_id: i64,
    pub text:                String,
}

/// Per-chat (or per-scope) notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationSettings {
    pub mute_for:     i32,
    pub sound:        String,
    pub show_preview: bool,
}

/// Where a [`NotificationSettings`] update applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NotificationSettingsScope {
    Chat { chat_id: i64 },
    PrivateChats,
    BasicGroupChats,
    AllChats,
}

/// A conversation.
///
/// `order` is owned by the chat list: it is only ever written through
/// [`crate::chat_list::ChatList::set_order`], never assigned directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chat {
    pub id:                          i64,
    pub kind:                        ChatType,
    pub title:                       String,
    pub photo:                       Option<ChatPhoto>,
    pub last_message:                Option<Message>,
    /// Position in the chat list; `0` means the chat is not listed.
    pub order:                       u64,
    pub is_pinned:                   bool,
    pub unread_count:                i32,
    pub last_read_inbox_message_id:  i64,
    pub last_read_outbox_message_id: i64,
    pub unread_mention_count:        i32,
    pub notification_settings:       NotificationSettings,
    pub reply_markup_message_id:     i64,
    pub draft_message:               Option<DraftMessage>,
}

// ─── Misc ─────────────────────────────────────────────────────────────────────

/// Value of a server-side option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptionValue {
    Empty,
    Boolean(bool),
    Integer(i64),
    String(String),
}

/// State of the transport's connection to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    #[default]
    WaitingForNetwork,
    ConnectingToProxy,
    Connecting,
    Updating,
    Ready,
}
