//! Graph metadata cache.
//!
//! 그래프 메타데이터 (속성 디스크립터, 노드/엣지 타입)

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::descriptor::{AttributeDescriptor, EntityType, SystemType};
use super::value::AttributeType;
use crate::driver::{DriverError, DriverResult};

#[derive(Debug, Default)]
struct MetadataState {
    descriptors_by_name: HashMap<String, Arc<AttributeDescriptor>>,
    descriptors_by_id: HashMap<i32, Arc<AttributeDescriptor>>,
    node_types: HashMap<String, Arc<EntityType>>,
    edge_types: HashMap<String, Arc<EntityType>>,
    types_by_id: HashMap<i32, Arc<EntityType>>,
    initialized: bool,
}

/// Session-wide metadata shared by every connection of a pool.
#[derive(Debug, Default)]
pub struct GraphMetadata {
    state: RwLock<MetadataState>,
}

impl GraphMetadata {
    /// Empty, uninitialized metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether server metadata has been loaded at least once.
    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    /// Descriptor by name.
    pub fn attribute_descriptor(&self, name: &str) -> Option<Arc<AttributeDescriptor>> {
        self.state.read().descriptors_by_name.get(name).cloned()
    }

    /// Descriptor by (temporary or permanent) id.
    pub fn attribute_descriptor_by_id(&self, id: i32) -> Option<Arc<AttributeDescriptor>> {
        self.state.read().descriptors_by_id.get(&id).cloned()
    }

    /// All known descriptors.
    pub fn attribute_descriptors(&self) -> Vec<Arc<AttributeDescriptor>> {
        self.state.read().descriptors_by_name.values().cloned().collect()
    }

    /// Register a descriptor, replacing any previous one with the same name.
    pub fn add_attribute_descriptor(&self, desc: Arc<AttributeDescriptor>) {
        let mut state = self.state.write();
        if let Some(old) = state.descriptors_by_name.insert(desc.name().to_string(), desc.clone()) {
            state.descriptors_by_id.remove(&old.id());
        }
        state.descriptors_by_id.insert(desc.id(), desc);
    }

    /// Create and register a descriptor with a temporary id.
    pub fn create_attribute_descriptor(
        &self,
        name: &str,
        attr_type: AttributeType,
        is_array: bool,
    ) -> Arc<AttributeDescriptor> {
        let desc = Arc::new(AttributeDescriptor::new(name, attr_type, is_array));
        self.add_attribute_descriptor(desc.clone());
        desc
    }

    /// Descriptor for `name`, created from `attr_type` when missing.
    ///
    /// Fails when an existing descriptor has a different type.
    pub fn get_or_create_attribute_descriptor(
        &self,
        name: &str,
        attr_type: AttributeType,
    ) -> DriverResult<Arc<AttributeDescriptor>> {
        if let Some(desc) = self.attribute_descriptor(name) {
            if desc.attr_type() != attr_type {
                return Err(DriverError::type_conversion(format!(
                    "attribute '{}' is {}, not {}",
                    name,
                    desc.attr_type(),
                    attr_type
                )));
            }
            return Ok(desc);
        }
        if attr_type == AttributeType::Invalid {
            return Err(DriverError::type_conversion(format!(
                "cannot create attribute '{}' of invalid type",
                name
            )));
        }
        Ok(self.create_attribute_descriptor(name, attr_type, false))
    }

    /// Descriptors still carrying a temporary id.
    pub fn pending_attribute_descriptors(&self) -> Vec<Arc<AttributeDescriptor>> {
        let state = self.state.read();
        let mut pending: Vec<_> = state
            .descriptors_by_name
            .values()
            .filter(|d| d.is_temporary())
            .cloned()
            .collect();
        // temp ids count down, so creation order is descending id
        pending.sort_by_key(|d| std::cmp::Reverse(d.id()));
        pending
    }

    /// Replace a temporary descriptor id with the server-assigned one.
    pub fn assign_attribute_id(&self, temp_id: i32, real_id: i32) -> bool {
        let mut state = self.state.write();
        match state.descriptors_by_id.remove(&temp_id) {
            Some(desc) => {
                desc.set_id(real_id);
                state.descriptors_by_id.insert(real_id, desc);
                true
            }
            None => false,
        }
    }

    pub fn node_type(&self, name: &str) -> Option<Arc<EntityType>> {
        self.state.read().node_types.get(name).cloned()
    }

    pub fn edge_type(&self, name: &str) -> Option<Arc<EntityType>> {
        self.state.read().edge_types.get(name).cloned()
    }

    /// Node or edge type by id.
    pub fn entity_type_by_id(&self, id: i32) -> Option<Arc<EntityType>> {
        self.state.read().types_by_id.get(&id).cloned()
    }

    pub fn node_types(&self) -> Vec<Arc<EntityType>> {
        self.state.read().node_types.values().cloned().collect()
    }

    pub fn edge_types(&self) -> Vec<Arc<EntityType>> {
        self.state.read().edge_types.values().cloned().collect()
    }

    /// Register a node or edge type.
    pub fn add_entity_type(&self, entity_type: EntityType) -> Arc<EntityType> {
        let entity_type = Arc::new(entity_type);
        let mut state = self.state.write();
        match entity_type.system_type {
            SystemType::EdgeType => {
                state.edge_types.insert(entity_type.name.clone(), entity_type.clone());
            }
            _ => {
                state.node_types.insert(entity_type.name.clone(), entity_type.clone());
            }
        }
        state.types_by_id.insert(entity_type.id, entity_type.clone());
        entity_type
    }

    /// Merge a metadata response.
    ///
    /// Server descriptors replace same-named local ones unless the local one
    /// is still pending commit; system node types are skipped.
    pub fn update(
        &self,
        descriptors: Vec<AttributeDescriptor>,
        node_types: Vec<EntityType>,
        edge_types: Vec<EntityType>,
    ) {
        for desc in descriptors {
            match self.attribute_descriptor(desc.name()) {
                Some(existing) if existing.is_temporary() => continue,
                _ => self.add_attribute_descriptor(Arc::new(desc)),
            }
        }
        for node_type in node_types {
            if node_type.is_system_name() {
                continue;
            }
            self.add_entity_type(node_type);
        }
        for edge_type in edge_types {
            self.add_entity_type(edge_type);
        }
        self.state.write().initialized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_descriptor() {
        let meta = GraphMetadata::new();
        let a = meta
            .get_or_create_attribute_descriptor("name", AttributeType::String)
            .unwrap();
        let b = meta
            .get_or_create_attribute_descriptor("name", AttributeType::String)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_temporary());

        let err = meta
            .get_or_create_attribute_descriptor("name", AttributeType::Integer)
            .unwrap_err();
        assert!(matches!(err, DriverError::TypeConversion(_)));
    }

    #[test]
    fn test_pending_and_assign() {
        let meta = GraphMetadata::new();
        meta.add_attribute_descriptor(Arc::new(AttributeDescriptor::with_id(
            7,
            "known",
            AttributeType::Long,
            false,
        )));
        let temp = meta.create_attribute_descriptor("fresh", AttributeType::Double, false);
        let temp_id = temp.id();

        let pending = meta.pending_attribute_descriptors();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name(), "fresh");

        assert!(meta.assign_attribute_id(temp_id, 100));
        assert_eq!(temp.id(), 100);
        assert!(meta.attribute_descriptor_by_id(100).is_some());
        assert!(meta.attribute_descriptor_by_id(temp_id).is_none());
        assert!(meta.pending_attribute_descriptors().is_empty());
        assert!(!meta.assign_attribute_id(temp_id, 101));
    }

    #[test]
    fn test_update_skips_system_types_and_pending() {
        let meta = GraphMetadata::new();
        let pending = meta.create_attribute_descriptor("age", AttributeType::Integer, false);

        meta.update(
            vec![
                AttributeDescriptor::with_id(1, "name", AttributeType::String, false),
                AttributeDescriptor::with_id(2, "age", AttributeType::Integer, false),
            ],
            vec![
                EntityType::new(10, "testnode", SystemType::NodeType),
                EntityType::new(11, "@sys", SystemType::NodeType),
            ],
            vec![EntityType::new(20, "knows", SystemType::EdgeType)],
        );

        assert!(meta.is_initialized());
        assert_eq!(meta.attribute_descriptor("name").map(|d| d.id()), Some(1));
        assert!(Arc::ptr_eq(&meta.attribute_descriptor("age").unwrap(), &pending));
        assert!(meta.node_type("testnode").is_some());
        assert!(meta.node_type("@sys").is_none());
        assert_eq!(meta.entity_type_by_id(20).map(|t| t.name.clone()), Some("knows".into()));
    }
}
