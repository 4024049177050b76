pub mod bridge;
pub mod codec;
pub mod live;
pub mod storage;
pub mod tools;

// Re-export commonly used types for convenience
pub use bridge::{RelayExit, SessionBridge, SessionOutcome};
pub use codec::{ClientFrame, ClientOutgoing, ClientRoute};
pub use live::{GeminiLiveConfig, GeminiLiveConnector, LiveConnector, LiveError, LiveResult};
pub use storage::{FirestoreRecordStore, MemoryRecordStore, RecordStore};
pub use tools::{ToolRegistry, default_registry};
