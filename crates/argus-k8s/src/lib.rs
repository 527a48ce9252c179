pub mod client;
pub mod error;
pub mod layer;
pub mod models;
pub mod pod_health;
pub mod restart_tracker;

pub use client::{
    GuardedPodClient,
    KubePodLister,
    PodLister,
};
pub use error::K8sError;
pub use layer::K8sLayerService;
pub use models::{
    LayerPriority,
    LayerState,
    LayerStatus,
    PodHealth,
};
pub use restart_tracker::RestartTracker;
