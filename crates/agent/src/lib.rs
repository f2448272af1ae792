//! Conversation layer of the borrowing assistant.
//!
//! - `sessions`: per-user session store with ordered, exclusive access and idle expiry
//! - `runtime`: the borrow workflow that turns inbound events into outbound messages
//!   and, on confirmation, a stored reservation
//! - `search`: multi-query catalog search
//! - `directory`: display-name lookup for requesters
//! - `outbound`: transport-neutral reply types

pub mod directory;
pub mod outbound;
pub mod runtime;
pub mod search;
pub mod sessions;

pub use directory::{DirectoryError, StaticUserDirectory, UserDirectory};
pub use outbound::{Audience, Disposition, MessageBody, OutboundMessage, WorkflowOutcome};
pub use runtime::{BorrowEvent, BorrowWorkflow};
pub use search::{parse_queries, CatalogSearch, SearchHit};
pub use sessions::{LockMode, SessionGuard, SessionStore};
