pub mod client;
pub mod queue;
pub mod snapshot;
pub mod suppression;
pub mod worker;

pub use client::{
    HttpNocTransport,
    NocError,
    NocTransport,
};
pub use queue::NocQueue;
pub use snapshot::NocSnapshotService;
pub use suppression::SuppressionCache;
pub use worker::NocWorker;
