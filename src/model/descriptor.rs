//! Attribute descriptors and entity types.

use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};

use super::value::AttributeType;

/// Default precision for Number attributes.
pub const DEFAULT_NUMBER_PRECISION: i16 = 20;
/// Default scale for Number attributes.
pub const DEFAULT_NUMBER_SCALE: i16 = 5;

static NEXT_TEMP_ATTRIBUTE_ID: AtomicI32 = AtomicI32::new(-1);

/// Next client-assigned (negative) descriptor id.
pub(crate) fn next_temp_attribute_id() -> i32 {
    NEXT_TEMP_ATTRIBUTE_ID.fetch_sub(1, Ordering::Relaxed)
}

// ============================================================================
// SystemType - 시스템 객체 타입
// ============================================================================

/// 시스템 객체 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemType {
    Invalid,
    AttributeDescriptor,
    NodeType,
    EdgeType,
}

impl SystemType {
    /// Map a wire byte.
    pub fn from_i8(value: i8) -> Self {
        match value {
            0 => Self::AttributeDescriptor,
            1 => Self::NodeType,
            2 => Self::EdgeType,
            _ => Self::Invalid,
        }
    }

    /// Wire byte.
    pub fn as_i8(self) -> i8 {
        match self {
            Self::Invalid => -1,
            Self::AttributeDescriptor => 0,
            Self::NodeType => 1,
            Self::EdgeType => 2,
        }
    }
}

// ============================================================================
// AttributeDescriptor - 속성 디스크립터
// ============================================================================

/// 속성 디스크립터
///
/// Shared session-wide through `Arc`. A descriptor created on the client
/// carries a negative temporary id until a commit assigns the permanent one,
/// so the id is stored atomically and fixed up in place.
#[derive(Debug)]
pub struct AttributeDescriptor {
    id: AtomicI32,
    name: String,
    attr_type: AttributeType,
    is_array: bool,
    precision: i16,
    scale: i16,
}

impl AttributeDescriptor {
    /// Descriptor with a fresh temporary id.
    pub fn new(name: impl Into<String>, attr_type: AttributeType, is_array: bool) -> Self {
        Self::with_id(next_temp_attribute_id(), name, attr_type, is_array)
    }

    /// Descriptor with a known id (usually server-assigned).
    pub fn with_id(
        id: i32,
        name: impl Into<String>,
        attr_type: AttributeType,
        is_array: bool,
    ) -> Self {
        Self {
            id: AtomicI32::new(id),
            name: name.into(),
            attr_type,
            is_array,
            precision: DEFAULT_NUMBER_PRECISION,
            scale: DEFAULT_NUMBER_SCALE,
        }
    }

    /// Set precision and scale; ignored unless the type is Number.
    pub fn with_precision(mut self, precision: i16, scale: i16) -> Self {
        if self.attr_type == AttributeType::Number {
            self.precision = precision;
            self.scale = scale;
        }
        self
    }

    pub fn id(&self) -> i32 {
        self.id.load(Ordering::Acquire)
    }

    pub(crate) fn set_id(&self, id: i32) {
        self.id.store(id, Ordering::Release);
    }

    /// Whether the id is still client-assigned.
    pub fn is_temporary(&self) -> bool {
        self.id() < 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr_type(&self) -> AttributeType {
        self.attr_type
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    pub fn precision(&self) -> i16 {
        self.precision
    }

    pub fn scale(&self) -> i16 {
        self.scale
    }
}

// ============================================================================
// EntityType - 엔티티 타입
// ============================================================================

/// Node or edge type as reported by server metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    /// Server type id
    pub id: i32,
    /// Type name
    pub name: String,
    /// NodeType or EdgeType
    pub system_type: SystemType,
    /// Storage page size
    pub page_size: i32,
    /// Names of the attributes declared on the type
    pub attribute_names: Vec<String>,
}

impl EntityType {
    /// Create an entity type.
    pub fn new(id: i32, name: impl Into<String>, system_type: SystemType) -> Self {
        Self {
            id,
            name: name.into(),
            system_type,
            page_size: 0,
            attribute_names: Vec::new(),
        }
    }

    /// Whether the name marks a server-internal type.
    pub fn is_system_name(&self) -> bool {
        self.name.starts_with('@') || self.name.starts_with('$')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_ids_are_negative_and_distinct() {
        let a = AttributeDescriptor::new("a", AttributeType::String, false);
        let b = AttributeDescriptor::new("b", AttributeType::Integer, false);
        assert!(a.is_temporary());
        assert!(b.is_temporary());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_set_id_fixes_up_in_place() {
        let desc = AttributeDescriptor::new("age", AttributeType::Integer, false);
        desc.set_id(42);
        assert_eq!(desc.id(), 42);
        assert!(!desc.is_temporary());
    }

    #[test]
    fn test_precision_only_for_number() {
        let num = AttributeDescriptor::with_id(1, "price", AttributeType::Number, false)
            .with_precision(10, 2);
        assert_eq!((num.precision(), num.scale()), (10, 2));

        let s = AttributeDescriptor::with_id(2, "name", AttributeType::String, false)
            .with_precision(10, 2);
        assert_eq!(s.precision(), DEFAULT_NUMBER_PRECISION);
    }

    #[test]
    fn test_system_type_bytes() {
        for t in [SystemType::AttributeDescriptor, SystemType::NodeType, SystemType::EdgeType] {
            assert_eq!(SystemType::from_i8(t.as_i8()), t);
        }
        assert_eq!(SystemType::from_i8(-1), SystemType::Invalid);
    }

    #[test]
    fn test_system_type_names() {
        assert!(EntityType::new(1, "@internal", SystemType::NodeType).is_system_name());
        assert!(!EntityType::new(2, "person", SystemType::NodeType).is_system_name());
    }
}
