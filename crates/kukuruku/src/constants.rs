pub const KUKURUKU_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const LOG_DIR_NAME: &str = "logs";
pub const LOG_FILE_NAME: &str = "kukuruku.log";

pub const DEFAULT_SELECTOR: &str = "fzf";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_PROMPT_FORMAT: &str = "{status}";

pub const ENV_HOME: &str = "KUKURUKU_HOME";
pub const ENV_SELECTOR: &str = "KUKURUKU_SELECTOR";
pub const ENV_CACHE_TTL: &str = "KUKURUKU_CACHE_TTL";
pub const ENV_PROMPT_FORMAT: &str = "KUKURUKU_PROMPT_FORMAT";

/// Rendered when no context is selected.
pub const STATUS_PLACEHOLDER: &str = "-/-";
pub const STATUS_DELIMITER: char = '/';
pub const STATUS_EMPTY_FIELD: &str = "-";
pub const STATUS_STALE_MARKER: char = '?';

/// Ctrl-] closes an exec session from the local side.
pub const DETACH_KEY: u8 = 0x1d;
/// Ctrl-C as seen by a remote tty.
pub const INTERRUPT_BYTE: u8 = 0x03;
pub const STREAM_BUFFER_SIZE: usize = 4096;
/// How long teardown waits for buffered output and queued input once a session ends.
pub const STREAM_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);
