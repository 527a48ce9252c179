pub mod batch_writer;
pub mod hazelcast;
pub mod map;
pub mod persistence;
pub mod vector;

pub use batch_writer::BatchWriter;
pub use hazelcast::HazelcastRestMap;
pub use map::{
    DistributedMap,
    InMemoryMap,
    MapError,
};
pub use persistence::{
    AlertsPersistence,
    BatchOutcome,
};
pub use vector::AlertsVector;
