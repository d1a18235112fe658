//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Default manager host
pub const DEFAULT_AMI_HOST: &str = "localhost";

/// Default manager username and secret
pub const DEFAULT_USERNAME: &str = "phpagi";
pub const DEFAULT_SECRET: &str = "phpagi";

/// Size of a single socket read
pub const READ_CHUNK: usize = 4096;

/// Maximum partial frame held in the receive buffer (16MB).
/// No legitimate manager frame comes close; hitting it means the peer is not
/// speaking AMI or never terminates its frames.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Protocol terminators
pub const LINE_TERMINATOR: &str = "\r\n";
pub const FRAME_TERMINATOR: &str = "\r\n\r\n";

/// Trailer of inline command output on `Follows` responses
pub const END_COMMAND: &str = "--END COMMAND--";

/// Prefix of generated action identifiers
pub const ACTION_ID_PREFIX: char = 'A';

/// `EventList` values delimiting an event-list bundle
pub const EVENT_LIST_START: &str = "start";
pub const EVENT_LIST_COMPLETE: &str = "Complete";

/// Registry key of the fallback event handler
pub const WILDCARD_EVENT: &str = "*";

/// TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Capacity of the channel behind [`ChannelForwarder`](crate::ChannelForwarder)
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 1000;
