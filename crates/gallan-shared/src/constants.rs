/// Application name
pub const APP_NAME: &str = "Gallan";

/// Label shown in chat lists for messages that carry media but no text
pub const MEDIA_PLACEHOLDER: &str = "Media";

/// Status line given to newly registered users
pub const DEFAULT_USER_STATUS: &str = "Hey there! I'm using Gallan";

/// Maximum message text length in characters
pub const MAX_MESSAGE_TEXT_LEN: usize = 4096;

/// Maximum media URL length in bytes
pub const MAX_MEDIA_URL_LEN: usize = 2048;

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 64;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Session lifetime (24 hours)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Number of recent messages fetched as context for conversation starters
pub const STARTER_CONTEXT_MESSAGES: usize = 5;

/// Number of recent messages quoted in the starter prompt
pub const STARTER_PROMPT_MESSAGES: usize = 3;
