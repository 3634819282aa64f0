//! Transaction Ledger
//!
//! 커밋 전까지 클라이언트 측에서 변경 사항을 추적한다.
//!
//! Insert, update and delete never touch the network; they file the entity
//! under its virtual id in exactly one of three maps. Commit builds one
//! request from the maps, and a successful response is applied in place to
//! the same `Arc<Entity>` objects the caller (and other entities) hold.

use std::collections::HashMap;

use tracing::debug;

use super::error::{DriverError, DriverResult};
use crate::model::{EntityKind, EntityRef, GraphMetadata};
use crate::protocol::message::{CommitTransactionRequest, CommitTransactionResponse};

// ============================================================================
// EntityMap - 삽입 순서를 유지하는 맵
// ============================================================================

/// Entities keyed by virtual id, iterated in insertion order.
#[derive(Debug, Default)]
struct EntityMap {
    order: Vec<i64>,
    entries: HashMap<i64, EntityRef>,
}

impl EntityMap {
    fn insert(&mut self, entity: &EntityRef) {
        let id = entity.virtual_id();
        if self.entries.insert(id, entity.clone()).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, virtual_id: i64) -> Option<EntityRef> {
        let removed = self.entries.remove(&virtual_id)?;
        self.order.retain(|id| *id != virtual_id);
        Some(removed)
    }

    fn contains(&self, virtual_id: i64) -> bool {
        self.entries.contains_key(&virtual_id)
    }

    fn values(&self) -> impl Iterator<Item = &EntityRef> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

/// Which ledger map holds an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntry {
    Added,
    Changed,
    Removed,
}

/// Counts applied by a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub descriptors: usize,
}

// ============================================================================
// TransactionLedger - 트랜잭션 장부
// ============================================================================

/// Pending mutations of one connection.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    added: EntityMap,
    changed: EntityMap,
    removed: EntityMap,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 변경 사항 없음
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Number of pending entities.
    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }

    /// Map currently holding `entity`.
    pub fn entry(&self, entity: &EntityRef) -> Option<LedgerEntry> {
        let id = entity.virtual_id();
        if self.added.contains(id) {
            Some(LedgerEntry::Added)
        } else if self.changed.contains(id) {
            Some(LedgerEntry::Changed)
        } else if self.removed.contains(id) {
            Some(LedgerEntry::Removed)
        } else {
            None
        }
    }

    pub fn added(&self) -> Vec<EntityRef> {
        self.added.values().cloned().collect()
    }

    pub fn changed(&self) -> Vec<EntityRef> {
        self.changed.values().cloned().collect()
    }

    pub fn removed(&self) -> Vec<EntityRef> {
        self.removed.values().cloned().collect()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Queue a new entity for insertion. Repeated calls are no-ops.
    pub fn insert(&mut self, entity: &EntityRef) -> DriverResult<()> {
        if !entity.is_new() {
            return Err(DriverError::transaction(format!(
                "entity {} already exists on the server",
                entity.entity_id()
            )));
        }
        if entity.is_deleted() {
            return Err(DriverError::transaction(format!(
                "entity {} was deleted",
                entity.virtual_id()
            )));
        }
        self.added.insert(entity);
        Ok(())
    }

    /// Queue a persisted entity for update.
    pub fn update(&mut self, entity: &EntityRef) -> DriverResult<()> {
        let id = entity.virtual_id();
        if self.added.contains(id) {
            return Ok(());
        }
        if self.removed.contains(id) || entity.is_deleted() {
            return Err(DriverError::transaction(format!(
                "cannot update deleted entity {}",
                entity.entity_id()
            )));
        }
        if entity.is_new() {
            return Err(DriverError::transaction(format!(
                "entity {} must be inserted before it is updated",
                id
            )));
        }
        self.changed.insert(entity);
        Ok(())
    }

    /// Queue an entity for deletion. Deleting a pending insert cancels it.
    pub fn delete(&mut self, entity: &EntityRef) -> DriverResult<()> {
        let id = entity.virtual_id();
        if self.added.remove(id).is_some() {
            self.changed.remove(id);
            entity.mark_deleted();
            return Ok(());
        }
        if entity.is_new() {
            return Err(DriverError::transaction(format!(
                "entity {} was never inserted",
                id
            )));
        }
        self.changed.remove(id);
        self.removed.insert(entity);
        Ok(())
    }

    /// Pull persisted endpoints of every pending edge into `changed`,
    /// unless the endpoint itself is being removed.
    fn cascade_edge_endpoints(&mut self) {
        let edges: Vec<EntityRef> = self
            .added
            .values()
            .chain(self.changed.values())
            .chain(self.removed.values())
            .filter(|e| e.kind() == EntityKind::Edge)
            .cloned()
            .collect();

        for edge in edges {
            for node in edge.vertices() {
                let id = node.virtual_id();
                if node.is_new() || self.removed.contains(id) || self.changed.contains(id) {
                    continue;
                }
                debug!(
                    "Existing node {} added to change list for edge {}",
                    node.entity_id(),
                    edge.virtual_id()
                );
                self.changed.insert(&node);
            }
        }
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Cascade, then build the commit request.
    pub fn build_request(&mut self, metadata: &GraphMetadata) -> CommitTransactionRequest {
        self.cascade_edge_endpoints();
        CommitTransactionRequest {
            descriptors: metadata.pending_attribute_descriptors(),
            added: self.added(),
            changed: self.changed(),
            removed: self.removed.values().map(|e| e.entity_id()).collect(),
        }
    }

    /// Apply a commit response. A failed response leaves the ledger as is.
    pub fn apply_response(
        &mut self,
        response: &CommitTransactionResponse,
        metadata: &GraphMetadata,
    ) -> DriverResult<CommitSummary> {
        if !response.is_success() {
            return Err(DriverError::from_commit_status(
                response.status,
                response.error_message.clone(),
            ));
        }

        // Resolve every fix-up first; nothing is touched unless all of it is usable.
        let mut inserts = Vec::with_capacity(self.added.len());
        for entity in self.added.values() {
            let added = response
                .added
                .iter()
                .find(|a| a.temp_id == entity.virtual_id())
                .ok_or_else(|| {
                    DriverError::protocol(format!(
                        "Commit response has no id for inserted entity {}",
                        entity.virtual_id()
                    ))
                })?;
            inserts.push((entity, added.real_id, wire_version(added.version)?));
        }
        let mut versions = Vec::with_capacity(response.changed.len());
        for (entity_id, version) in &response.changed {
            if let Some(entity) = self.changed.values().find(|e| e.entity_id() == *entity_id) {
                versions.push((entity, wire_version(*version)?));
            }
        }

        let mut summary = CommitSummary::default();

        for (temp_id, real_id) in &response.descriptor_ids {
            if metadata.assign_attribute_id(*temp_id, *real_id) {
                summary.descriptors += 1;
            }
        }

        for (entity, real_id, version) in inserts {
            debug!("Replace entity id {} by {}", entity.virtual_id(), real_id);
            entity.apply_insert(real_id, version);
            summary.added += 1;
        }

        for (entity, version) in versions {
            entity.set_version(version);
            summary.changed += 1;
        }

        for entity in self.removed.values() {
            entity.mark_deleted();
            summary.removed += 1;
        }
        for entity in self.added.values().chain(self.changed.values()) {
            entity.reset_modified_attributes();
        }

        self.clear();
        Ok(summary)
    }

    /// Drop every pending change.
    pub fn rollback(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.added.clear();
        self.changed.clear();
        self.removed.clear();
    }
}

fn wire_version(version: i64) -> DriverResult<i32> {
    i32::try_from(version)
        .map_err(|_| DriverError::protocol(format!("Entity version {} out of range", version)))
}

// ============================================================================
// Tests
// ============================================================================
