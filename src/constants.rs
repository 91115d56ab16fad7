/// Constants module to avoid magic numbers in the codebase

// Configuration
pub const ENV_PREFIX: &str = "PARLEY_";
pub const LOCAL_CONFIG_PATH: &str = ".parley/config.toml";

// Endpoint values shipped in templates and docs. Treated as "not configured".
pub const PLACEHOLDER_ENDPOINTS: &[&str] = &[
    "YOUR_ENDPOINT_URL",
    "https://your-endpoint.example.com",
    "changeme",
];

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 120;

// Conversation titles
pub const TITLE_PREVIEW_CHARS: usize = 30;
pub const TITLE_ELLIPSIS: &str = "...";
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

// Pending placeholder turn
pub const PLACEHOLDER_TURN_ID: &str = "__parley_pending__";
pub const PLACEHOLDER_TURN_CONTENT: &str = "...";
