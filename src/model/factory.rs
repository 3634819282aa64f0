//! Graph object factory and composite keys.

use std::sync::Arc;

use super::descriptor::EntityType;
use super::entity::{Attribute, Direction, Entity, EntityKind, EntityRef};
use super::metadata::GraphMetadata;
use super::value::Value;
use crate::driver::{DriverError, DriverResult};

// ============================================================================
// GraphObjectFactory - 그래프 객체 팩토리
// ============================================================================

/// Creates entities bound to one metadata instance.
///
/// Entities created here are new (negative virtual id, `is_new() == true`)
/// and become persistent only through `Connection::insert_entity` followed
/// by a commit.
#[derive(Debug, Clone)]
pub struct GraphObjectFactory {
    metadata: Arc<GraphMetadata>,
}

impl GraphObjectFactory {
    /// 팩토리 생성
    pub fn new(metadata: Arc<GraphMetadata>) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &Arc<GraphMetadata> {
        &self.metadata
    }

    /// Untyped node.
    pub fn create_node(&self) -> EntityRef {
        Entity::new_node(self.metadata.clone(), None)
    }

    /// Node of a known node type.
    pub fn create_node_of_type(&self, type_name: &str) -> DriverResult<EntityRef> {
        let node_type = self.metadata.node_type(type_name).ok_or_else(|| {
            DriverError::type_conversion(format!("unknown node type '{}'", type_name))
        })?;
        Ok(Entity::new_node(self.metadata.clone(), Some(node_type)))
    }

    /// Edge between two nodes.
    pub fn create_edge(
        &self,
        from: &EntityRef,
        to: &EntityRef,
        direction: Direction,
    ) -> DriverResult<EntityRef> {
        self.edge(from, to, direction, None)
    }

    /// Edge of a known edge type; the direction comes from the caller.
    pub fn create_edge_of_type(
        &self,
        type_name: &str,
        from: &EntityRef,
        to: &EntityRef,
        direction: Direction,
    ) -> DriverResult<EntityRef> {
        let edge_type = self.metadata.edge_type(type_name).ok_or_else(|| {
            DriverError::type_conversion(format!("unknown edge type '{}'", type_name))
        })?;
        self.edge(from, to, direction, Some(edge_type))
    }

    fn edge(
        &self,
        from: &EntityRef,
        to: &EntityRef,
        direction: Direction,
        edge_type: Option<Arc<EntityType>>,
    ) -> DriverResult<EntityRef> {
        for endpoint in [from, to] {
            if endpoint.kind() != EntityKind::Node {
                return Err(DriverError::type_conversion(format!(
                    "edge endpoint must be a node, got {}",
                    endpoint.kind()
                )));
            }
        }
        Ok(Entity::new_edge(
            self.metadata.clone(),
            from,
            to,
            direction,
            edge_type,
        ))
    }

    pub fn create_graph(&self) -> EntityRef {
        Entity::new_graph(self.metadata.clone(), None)
    }

    /// Empty key, optionally restricted to a node type.
    pub fn create_composite_key(&self, type_name: Option<&str>) -> CompositeKey {
        CompositeKey {
            type_name: type_name.map(str::to_string),
            attributes: Vec::new(),
            metadata: self.metadata.clone(),
        }
    }

    /// Placeholder used by the entity decoder; `None` for `Invalid`.
    pub(crate) fn create_shell(&self, kind: EntityKind, wire_id: i64) -> Option<EntityRef> {
        Entity::shell(kind, self.metadata.clone(), wire_id)
    }
}

// ============================================================================
// CompositeKey - 복합 키
// ============================================================================

/// Lookup key for `Connection::get_entity`.
#[derive(Debug, Clone)]
pub struct CompositeKey {
    type_name: Option<String>,
    attributes: Vec<Attribute>,
    metadata: Arc<GraphMetadata>,
}

impl CompositeKey {
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Add or replace a key attribute.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> DriverResult<()> {
        let value = value.into();
        let attr_type = value.attribute_type().ok_or_else(|| {
            DriverError::type_conversion(format!("key attribute '{}' cannot be null", name))
        })?;
        let descriptor = self
            .metadata
            .get_or_create_attribute_descriptor(name, attr_type)?;
        let attr = Attribute::new(descriptor, value, true);
        match self.attributes.iter_mut().find(|a| a.name() == name) {
            Some(existing) => *existing = attr,
            None => self.attributes.push(attr),
        }
        Ok(())
    }

    /// Builder-style [`set_attribute`](Self::set_attribute).
    pub fn with_attribute(mut self, name: &str, value: impl Into<Value>) -> DriverResult<Self> {
        self.set_attribute(name, value)?;
        Ok(self)
    }
}
