// Real-time comment synchronization for itinerary days.
//
// `SyncEngine::start` opens a `RoomSession`: access is resolved first, then
// the push connection and a guarded bulk fetch run side by side, and both
// feed one ordered, deduplicated comment list.

pub mod access;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod liveness;
pub mod retry;
pub mod store;
pub mod transport;

pub use access::AccessResolver;
pub use config::{ClientConfig, ConfigError, Timings};
pub use connection::{
    ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState, ReconnectPolicy,
};
pub use engine::{EngineSettings, RoomSession, SessionStatus, SubmitOutcome, SyncEngine, SyncMode};
pub use error::{ApiError, ErrorCode, SyncError, TransportError};
pub use retry::{BulkFetch, RetryCoordinator, RetryPolicy};
pub use store::{CommentStore, InsertOutcome, MergeSummary, RemoveOutcome};
pub use transport::http::HttpApi;
pub use transport::ws::WsPushTransport;
pub use transport::{AuthorizationService, PullApi, PushTransport};
