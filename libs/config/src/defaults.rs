//! Default values shared across broker components

/// Server defaults
pub mod server {
    /// Listener address
    pub const BIND_ADDRESS: &str = "127.0.0.1:1234";

    /// Longest accepted command line (1MB)
    pub const MAX_COMMAND_LENGTH: usize = 1024 * 1024;

    /// Upper bound for frame topic/payload lengths (16MB)
    pub const MAX_FRAME_FIELD_LENGTH: usize = 16 * 1024 * 1024;
}

/// Channel engine defaults
pub mod channel {
    /// Messages buffered per channel before new ones are dropped
    pub const BUFFER_SIZE: usize = 10_000;

    /// In-flight watchdog duration (milliseconds)
    pub const MESSAGE_TIMEOUT_MS: u64 = 60_000;

    /// Capacity of each request inbox of the channel owner task
    pub const INBOX_SIZE: usize = 1024;
}

/// Topic defaults
pub mod topics {
    /// Channel created together with every topic
    pub const DEFAULT_CHANNEL: &str = "default";
}

/// Unique-id supplier defaults
pub mod ids {
    /// Ids generated ahead of demand
    pub const BUFFER_SIZE: usize = 1024;

    /// First id handed out
    pub const FIRST_ID: u64 = 1;
}

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "BROKER";

/// Separator between prefix, section and key in override variables
pub const ENV_SEPARATOR: &str = "__";
