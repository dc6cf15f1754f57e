pub mod batcher;
pub mod feed;
pub mod resolver;
pub mod scheduler;
pub mod settings;
pub mod transport;

pub use batcher::ClientBatcher;
pub use feed::MemoryFeed;
pub use resolver::{resolve_action, Decision};
pub use scheduler::{
    extract_text, ContentId, ContentScheduler, ContentSource, DiscoveredContent, ItemState,
};
pub use settings::{SettingsStore, SETTINGS_KEY};
pub use transport::{ClassifyTransport, HttpTransport, TransportError};
