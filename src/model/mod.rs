//! Graph object model
//!
//! 엔티티, 속성, 메타데이터

pub mod descriptor;
pub mod entity;
pub mod factory;
pub mod metadata;
pub mod value;

pub use descriptor::{AttributeDescriptor, EntityType, SystemType};
pub use entity::{Attribute, Direction, Entity, EntityKind, EntityRef};
pub use factory::{CompositeKey, GraphObjectFactory};
pub use metadata::GraphMetadata;
pub use value::{AttributeType, LargeObject, Value};
