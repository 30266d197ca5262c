use crate::model::{Checkpoint, GroupId};
use dashmap::DashMap;

/// Continuation state per tenant group.
///
/// Implementations must tolerate concurrent access from every group task
/// of a cycle. A given group is only ever written by the one task that is
/// processing it.
pub trait CheckpointStore: Send + Sync {
    fn get(&self, group: GroupId) -> Option<Checkpoint>;

    fn set(&self, group: GroupId, checkpoint: Checkpoint);
}

/// Process-lifetime store. Nothing survives a restart; resumption then
/// falls back to the time window alone.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: DashMap<GroupId, Checkpoint>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self, group: GroupId) -> Option<Checkpoint> {
        self.checkpoints.get(&group).map(|entry| entry.value().clone())
    }

    fn set(&self, group: GroupId, checkpoint: Checkpoint) {
        self.checkpoints.insert(group, checkpoint);
    }
}
