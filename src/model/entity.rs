//! Entities: nodes, edges and graphs.
//!
//! Entities are shared (`EntityRef = Arc<Entity>`) because the same object is
//! referenced from result sets, from the ledger and from other entities. The
//! mutable part lives behind a `parking_lot::RwLock` so commit fix-up can
//! rewrite ids and versions in place.
//!
//! Ownership runs edge → node: an edge holds `Arc`s to its endpoints while a
//! node keeps `Weak` references to its edges. Decode passes keep every
//! materialized object alive in the returned result set.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use super::descriptor::{AttributeDescriptor, EntityType};
use super::metadata::GraphMetadata;
use super::value::Value;
use crate::driver::{DriverError, DriverResult};

/// Shared handle to an entity.
pub type EntityRef = Arc<Entity>;

static NEXT_VIRTUAL_ID: AtomicI64 = AtomicI64::new(-1);

fn next_virtual_id() -> i64 {
    NEXT_VIRTUAL_ID.fetch_sub(1, Ordering::Relaxed)
}

// ============================================================================
// EntityKind - 엔티티 종류
// ============================================================================

/// 엔티티 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Unknown or unsupported kind byte
    Invalid,
    Node,
    Edge,
    Graph,
}

impl EntityKind {
    /// Map a wire kind byte. The generic entity kind (1) and unknown values
    /// are not materialized and map to `Invalid`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            2 => Self::Node,
            3 => Self::Edge,
            4 => Self::Graph,
            _ => Self::Invalid,
        }
    }

    /// Wire kind byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Node => 2,
            Self::Edge => 3,
            Self::Graph => 4,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::Node => "Node",
            Self::Edge => "Edge",
            Self::Graph => "Graph",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Direction - 엣지 방향
// ============================================================================

/// 엣지 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    Undirected,
    Directed,
    #[default]
    Bidirectional,
}

impl Direction {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Undirected,
            1 => Self::Directed,
            _ => Self::Bidirectional,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Undirected => 0,
            Self::Directed => 1,
            Self::Bidirectional => 2,
        }
    }
}

// ============================================================================
// Attribute - 속성
// ============================================================================

/// An attribute value bound to its descriptor.
#[derive(Debug, Clone)]
pub struct Attribute {
    descriptor: Arc<AttributeDescriptor>,
    value: Value,
    modified: bool,
}

impl Attribute {
    pub(crate) fn new(descriptor: Arc<AttributeDescriptor>, value: Value, modified: bool) -> Self {
        Self {
            descriptor,
            value,
            modified,
        }
    }

    pub fn descriptor(&self) -> &Arc<AttributeDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Changed since the last commit or decode.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

// ============================================================================
// Entity - 엔티티
// ============================================================================

/// Kind-specific entity data.
pub(crate) enum EntityBody {
    Node {
        edges: Vec<Weak<Entity>>,
    },
    Edge {
        direction: Direction,
        from: Option<EntityRef>,
        to: Option<EntityRef>,
    },
    Graph {
        edges: Vec<Weak<Entity>>,
    },
}

impl EntityBody {
    fn empty(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Node => Some(EntityBody::Node { edges: Vec::new() }),
            EntityKind::Edge => Some(EntityBody::Edge {
                direction: Direction::default(),
                from: None,
                to: None,
            }),
            EntityKind::Graph => Some(EntityBody::Graph { edges: Vec::new() }),
            EntityKind::Invalid => None,
        }
    }
}

/// Mutable entity state.
pub(crate) struct EntityState {
    pub(crate) entity_id: i64,
    pub(crate) version: i32,
    pub(crate) is_new: bool,
    pub(crate) is_deleted: bool,
    pub(crate) is_initialized: bool,
    pub(crate) entity_type: Option<Arc<EntityType>>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) body: EntityBody,
}

impl EntityState {
    pub(crate) fn set_attribute(&mut self, attr: Attribute) {
        match self.attributes.iter_mut().find(|a| a.name() == attr.name()) {
            Some(existing) => *existing = attr,
            None => self.attributes.push(attr),
        }
    }
}

/// A node, edge or graph.
pub struct Entity {
    virtual_id: i64,
    kind: EntityKind,
    metadata: Arc<GraphMetadata>,
    state: RwLock<EntityState>,
}

impl Entity {
    fn build(
        kind: EntityKind,
        metadata: Arc<GraphMetadata>,
        body: EntityBody,
        entity_type: Option<Arc<EntityType>>,
        wire_id: Option<i64>,
    ) -> Self {
        let virtual_id = next_virtual_id();
        let is_new = wire_id.is_none();
        Self {
            virtual_id,
            kind,
            metadata,
            state: RwLock::new(EntityState {
                entity_id: wire_id.unwrap_or(virtual_id),
                version: 0,
                is_new,
                is_deleted: false,
                is_initialized: is_new,
                entity_type,
                attributes: Vec::new(),
                body,
            }),
        }
    }

    /// New client-side node.
    pub(crate) fn new_node(
        metadata: Arc<GraphMetadata>,
        entity_type: Option<Arc<EntityType>>,
    ) -> EntityRef {
        Arc::new(Self::build(
            EntityKind::Node,
            metadata,
            EntityBody::Node { edges: Vec::new() },
            entity_type,
            None,
        ))
    }

    /// New client-side graph.
    pub(crate) fn new_graph(
        metadata: Arc<GraphMetadata>,
        entity_type: Option<Arc<EntityType>>,
    ) -> EntityRef {
        Arc::new(Self::build(
            EntityKind::Graph,
            metadata,
            EntityBody::Graph { edges: Vec::new() },
            entity_type,
            None,
        ))
    }

    /// New client-side edge, registered with both endpoints.
    pub(crate) fn new_edge(
        metadata: Arc<GraphMetadata>,
        from: &EntityRef,
        to: &EntityRef,
        direction: Direction,
        entity_type: Option<Arc<EntityType>>,
    ) -> EntityRef {
        let edge = Arc::new(Self::build(
            EntityKind::Edge,
            metadata,
            EntityBody::Edge {
                direction,
                from: Some(from.clone()),
                to: Some(to.clone()),
            },
            entity_type,
            None,
        ));
        from.add_edge(&edge);
        if !Arc::ptr_eq(from, to) {
            to.add_edge(&edge);
        }
        edge
    }

    /// Uninitialized placeholder for a server entity seen during decoding.
    pub(crate) fn shell(
        kind: EntityKind,
        metadata: Arc<GraphMetadata>,
        wire_id: i64,
    ) -> Option<EntityRef> {
        let body = EntityBody::empty(kind)?;
        Some(Arc::new(Self::build(kind, metadata, body, None, Some(wire_id))))
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Client-assigned id; never changes.
    pub fn virtual_id(&self) -> i64 {
        self.virtual_id
    }

    /// Server id, or the virtual id until the first successful commit.
    pub fn entity_id(&self) -> i64 {
        self.state.read().entity_id
    }

    pub fn version(&self) -> i32 {
        self.state.read().version
    }

    pub fn is_new(&self) -> bool {
        self.state.read().is_new
    }

    pub fn is_deleted(&self) -> bool {
        self.state.read().is_deleted
    }

    /// False for shells whose fields have not been decoded yet.
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_initialized
    }

    pub fn entity_type(&self) -> Option<Arc<EntityType>> {
        self.state.read().entity_type.clone()
    }

    /// Metadata this entity resolves attribute names against.
    pub fn metadata(&self) -> &Arc<GraphMetadata> {
        &self.metadata
    }

    /// Whether any attribute changed since the last commit.
    pub fn is_modified(&self) -> bool {
        self.state.read().attributes.iter().any(Attribute::is_modified)
    }

    /// Snapshot of all attributes in insertion order.
    pub fn attributes(&self) -> Vec<Attribute> {
        self.state.read().attributes.clone()
    }

    /// Value of the named attribute.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.state
            .read()
            .attributes
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.value.clone())
    }

    pub fn is_attribute_set(&self, name: &str) -> bool {
        self.state.read().attributes.iter().any(|a| a.name() == name)
    }

    /// Set an attribute, creating its descriptor from the value type if the
    /// name is unknown.
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) -> DriverResult<()> {
        let value = value.into();
        if self.is_deleted() {
            return Err(DriverError::transaction(format!(
                "cannot modify deleted entity {}",
                self.virtual_id
            )));
        }

        let descriptor = match value.attribute_type() {
            Some(attr_type) => self
                .metadata
                .get_or_create_attribute_descriptor(name, attr_type)?,
            None => self.metadata.attribute_descriptor(name).ok_or_else(|| {
                DriverError::type_conversion(format!(
                    "cannot set unknown attribute '{}' to null",
                    name
                ))
            })?,
        };

        self.state.write().set_attribute(Attribute::new(descriptor, value, true));
        Ok(())
    }

    /// Edges of a node or graph that are still alive.
    pub fn edges(&self) -> Vec<EntityRef> {
        match &self.state.read().body {
            EntityBody::Node { edges } | EntityBody::Graph { edges } => {
                edges.iter().filter_map(Weak::upgrade).collect()
            }
            EntityBody::Edge { .. } => Vec::new(),
        }
    }

    pub(crate) fn add_edge(&self, edge: &EntityRef) {
        let mut state = self.state.write();
        if let EntityBody::Node { edges } | EntityBody::Graph { edges } = &mut state.body {
            let ptr = Arc::as_ptr(edge);
            if !edges.iter().any(|w| Weak::as_ptr(w) == ptr) {
                edges.push(Arc::downgrade(edge));
            }
        }
    }

    /// Direction of an edge.
    pub fn direction(&self) -> Option<Direction> {
        match &self.state.read().body {
            EntityBody::Edge { direction, .. } => Some(*direction),
            _ => None,
        }
    }

    /// Source node of an edge.
    pub fn from_node(&self) -> Option<EntityRef> {
        match &self.state.read().body {
            EntityBody::Edge { from, .. } => from.clone(),
            _ => None,
        }
    }

    /// Target node of an edge.
    pub fn to_node(&self) -> Option<EntityRef> {
        match &self.state.read().body {
            EntityBody::Edge { to, .. } => to.clone(),
            _ => None,
        }
    }

    /// Distinct endpoints of an edge (one for a self-loop).
    pub fn vertices(&self) -> Vec<EntityRef> {
        let mut nodes: Vec<EntityRef> = self.from_node().into_iter().collect();
        if let Some(to) = self.to_node() {
            if !nodes.iter().any(|n| Arc::ptr_eq(n, &to)) {
                nodes.push(to);
            }
        }
        nodes
    }

    pub(crate) fn state(&self) -> RwLockReadGuard<'_, EntityState> {
        self.state.read()
    }

    pub(crate) fn state_mut(&self) -> RwLockWriteGuard<'_, EntityState> {
        self.state.write()
    }

    /// Post-commit fix-up of an inserted entity.
    pub(crate) fn apply_insert(&self, entity_id: i64, version: i32) {
        let mut state = self.state.write();
        state.entity_id = entity_id;
        state.version = version;
        state.is_new = false;
    }

    pub(crate) fn set_version(&self, version: i32) {
        self.state.write().version = version;
    }

    pub(crate) fn mark_deleted(&self) {
        self.state.write().is_deleted = true;
    }

    pub(crate) fn reset_modified_attributes(&self) {
        for attr in self.state.write().attributes.iter_mut() {
            attr.modified = false;
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let mut d = f.debug_struct("Entity");
        d.field("kind", &self.kind)
            .field("virtual_id", &self.virtual_id)
            .field("entity_id", &state.entity_id)
            .field("version", &state.version)
            .field("is_new", &state.is_new)
            .field("is_deleted", &state.is_deleted)
            .field("attributes", &state.attributes.len());
        // endpoints by id only, the graph may be cyclic
        if let EntityBody::Edge { from, to, .. } = &state.body {
            d.field("from", &from.as_ref().map(|n| n.virtual_id))
                .field("to", &to.as_ref().map(|n| n.virtual_id));
        }
        d.finish()
    }
}
