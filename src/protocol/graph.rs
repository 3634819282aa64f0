//! Entity graph codec.
//!
//! Writes entities, attributes and descriptors, and rebuilds node/edge graphs
//! from an entity stream. Decoding is driven by the reference map carried on
//! the [`InputStream`]: every wire id resolves to exactly one client object
//! per pass, and a shell is registered in the map *before* its fields are
//! read so that cyclic references (node → edge → node) land on the same
//! object instead of recursing.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::{trace, warn};

use super::error::{ProtocolError, ProtocolResult};
use super::stream::{InputStream, OutputStream, ReferenceMap};
use crate::model::entity::EntityBody;
use crate::model::{
    Attribute, AttributeDescriptor, AttributeType, Direction, Entity, EntityKind, EntityRef,
    GraphMetadata, GraphObjectFactory, LargeObject, SystemType, Value,
};

/// Time zone marker for local (zone-less) temporal values.
const TZ_NONE: i8 = -1;

// ============================================================================
// Values
// ============================================================================

fn write_temporal(out: &mut OutputStream, date: NaiveDate, time: NaiveTime) {
    let year = date.year();
    let era_ad = year > 0;
    let wire_year = if era_ad { year } else { 1 - year };
    out.write_bool(era_ad);
    out.write_i16(wire_year as i16);
    out.write_u8(date.month() as u8);
    out.write_u8(date.day() as u8);
    out.write_u8(time.hour() as u8);
    out.write_u8(time.minute() as u8);
    out.write_u8(time.second() as u8);
    out.write_u16((time.nanosecond() / 1_000_000).min(999) as u16);
    out.write_i8(TZ_NONE);
}

fn read_temporal(input: &mut InputStream) -> ProtocolResult<NaiveDateTime> {
    let era_ad = input.read_bool()?;
    let year = i32::from(input.read_i16()?);
    let year = if era_ad { year } else { 1 - year };
    let month = u32::from(input.read_u8()?);
    let day = u32::from(input.read_u8()?);
    let hour = u32::from(input.read_u8()?);
    let minute = u32::from(input.read_u8()?);
    let second = u32::from(input.read_u8()?);
    let millis = u32::from(input.read_u16()?);
    let tz = input.read_i8()?;
    if tz != TZ_NONE {
        // zone id; values are surfaced as local time
        input.read_i16()?;
    }

    let date = NaiveDate::from_ymd_opt(year, month.max(1), day.max(1)).ok_or_else(|| {
        ProtocolError::malformed(format!("invalid date {}-{}-{}", year, month, day))
    })?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis).ok_or_else(|| {
        ProtocolError::malformed(format!(
            "invalid time {}:{}:{}.{}",
            hour, minute, second, millis
        ))
    })?;
    Ok(date.and_time(time))
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn write_large_object(out: &mut OutputStream, lob: &LargeObject) -> ProtocolResult<()> {
    out.write_i64(lob.entity_id);
    match &lob.data {
        Some(data) => {
            out.write_bool(true);
            out.write_bytes(data)
        }
        None => {
            out.write_bool(false);
            Ok(())
        }
    }
}

/// Write a non-null value in its descriptor's encoding.
pub fn write_value(
    out: &mut OutputStream,
    value: &Value,
    descriptor: &AttributeDescriptor,
) -> ProtocolResult<()> {
    match value {
        Value::Null => {
            return Err(ProtocolError::malformed(format!(
                "null value for attribute '{}' has no encoding",
                descriptor.name()
            )))
        }
        Value::Boolean(v) => out.write_bool(*v),
        Value::Byte(v) => out.write_i8(*v),
        Value::Char(v) => out.write_char(*v)?,
        Value::Short(v) => out.write_i16(*v),
        Value::Integer(v) => out.write_i32(*v),
        Value::Long(v) => out.write_i64(*v),
        Value::Float(v) => out.write_f32(*v),
        Value::Double(v) => out.write_f64(*v),
        Value::Number(v) => {
            out.write_i16(descriptor.precision());
            out.write_i16(descriptor.scale());
            out.write_utf(v)?;
        }
        Value::String(v) => out.write_utf(v)?,
        Value::Date(d) => write_temporal(out, *d, NaiveTime::default()),
        Value::Time(t) => write_temporal(out, epoch_date(), *t),
        Value::TimeStamp(ts) => write_temporal(out, ts.date(), ts.time()),
        Value::Blob(lob) | Value::Clob(lob) => write_large_object(out, lob)?,
    }
    Ok(())
}

/// Read a non-null value of the given type.
pub fn read_value(input: &mut InputStream, attr_type: AttributeType) -> ProtocolResult<Value> {
    let value = match attr_type {
        AttributeType::Invalid => {
            return Err(ProtocolError::malformed("value of invalid attribute type"))
        }
        AttributeType::Boolean => Value::Boolean(input.read_bool()?),
        AttributeType::Byte => Value::Byte(input.read_i8()?),
        AttributeType::Char => Value::Char(input.read_char()?),
        AttributeType::Short => Value::Short(input.read_i16()?),
        AttributeType::Integer => Value::Integer(input.read_i32()?),
        AttributeType::Long => Value::Long(input.read_i64()?),
        AttributeType::Float => Value::Float(input.read_f32()?),
        AttributeType::Double => Value::Double(input.read_f64()?),
        AttributeType::Number => {
            let _precision = input.read_i16()?;
            let _scale = input.read_i16()?;
            Value::Number(input.read_utf()?)
        }
        AttributeType::String => Value::String(input.read_utf()?),
        AttributeType::Date => Value::Date(read_temporal(input)?.date()),
        AttributeType::Time => Value::Time(read_temporal(input)?.time()),
        AttributeType::TimeStamp => Value::TimeStamp(read_temporal(input)?),
        AttributeType::Blob => Value::Blob(LargeObject::reference(input.read_i64()?)),
        AttributeType::Clob => Value::Clob(LargeObject::reference(input.read_i64()?)),
    };
    Ok(value)
}

// ============================================================================
// Attributes and descriptors
// ============================================================================

/// Write an attribute: descriptor id, null flag, value.
pub fn write_attribute(out: &mut OutputStream, attr: &Attribute) -> ProtocolResult<()> {
    out.write_i32(attr.descriptor().id());
    out.write_bool(attr.is_null());
    if !attr.is_null() {
        write_value(out, attr.value(), attr.descriptor())?;
    }
    Ok(())
}

/// Read an attribute, resolving its descriptor through `metadata`.
pub fn read_attribute(input: &mut InputStream, metadata: &GraphMetadata) -> ProtocolResult<Attribute> {
    let desc_id = input.read_i32()?;
    let descriptor = metadata.attribute_descriptor_by_id(desc_id).ok_or_else(|| {
        ProtocolError::malformed(format!("unknown attribute descriptor id {}", desc_id))
    })?;
    let value = if input.read_bool()? {
        Value::Null
    } else {
        read_value(input, descriptor.attr_type())?
    };
    Ok(Attribute::new(descriptor, value, false))
}

pub fn write_descriptor(out: &mut OutputStream, desc: &AttributeDescriptor) -> ProtocolResult<()> {
    out.write_i8(SystemType::AttributeDescriptor.as_i8());
    out.write_i32(desc.id());
    out.write_utf(desc.name())?;
    out.write_u8(desc.attr_type().as_u8());
    out.write_bool(desc.is_array());
    if desc.attr_type() == AttributeType::Number {
        out.write_i16(desc.precision());
        out.write_i16(desc.scale());
    }
    Ok(())
}

pub fn read_descriptor(input: &mut InputStream) -> ProtocolResult<AttributeDescriptor> {
    let sys_type = SystemType::from_i8(input.read_i8()?);
    if sys_type != SystemType::AttributeDescriptor {
        return Err(ProtocolError::malformed(format!(
            "expected attribute descriptor, got {:?}",
            sys_type
        )));
    }
    let id = input.read_i32()?;
    let name = input.read_utf()?;
    let attr_type = AttributeType::from_u8(input.read_u8()?);
    let is_array = input.read_bool()?;
    let desc = AttributeDescriptor::with_id(id, name, attr_type, is_array);
    if attr_type == AttributeType::Number {
        let precision = input.read_i16()?;
        let scale = input.read_i16()?;
        return Ok(desc.with_precision(precision, scale));
    }
    Ok(desc)
}

// ============================================================================
// Entities
// ============================================================================

/// Write an entity record for a commit request.
///
/// Only modified attributes are sent, and a node or graph lists only its
/// new edges.
pub fn write_entity(out: &mut OutputStream, entity: &Entity) -> ProtocolResult<()> {
    let start = out.position();
    out.write_i32(0);

    let state = entity.state();
    out.write_bool(state.is_new);
    out.write_u8(entity.kind().as_u8());
    out.write_i64(state.entity_id);
    out.write_i32(state.version);
    out.write_i32(state.entity_type.as_ref().map_or(0, |t| t.id));

    let modified: Vec<&Attribute> = state.attributes.iter().filter(|a| a.is_modified()).collect();
    out.write_i32(modified.len() as i32);
    for attr in modified {
        write_attribute(out, attr)?;
    }

    match &state.body {
        EntityBody::Node { edges } | EntityBody::Graph { edges } => {
            let new_edges: Vec<EntityRef> = edges
                .iter()
                .filter_map(|e| e.upgrade())
                .filter(|e| e.is_new())
                .collect();
            out.write_i32(new_edges.len() as i32);
            for edge in new_edges {
                out.write_i64(edge.entity_id());
            }
        }
        EntityBody::Edge { direction, from, to } => {
            let (from, to) = match (from, to) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    return Err(ProtocolError::malformed(format!(
                        "edge {} has no endpoints",
                        entity.virtual_id()
                    )))
                }
            };
            out.write_u8(direction.as_u8());
            out.write_i64(from.entity_id());
            out.write_i64(to.entity_id());
        }
    }
    drop(state);

    out.patch_length_at(start)
}

/// Result of decoding one entity stream.
#[derive(Debug, Default)]
pub struct DecodedGraph {
    /// Entity count declared by the stream
    pub total_count: i32,
    /// Result count declared by the stream
    pub result_count: i32,
    /// Entities flagged as results, in stream order
    pub results: Vec<EntityRef>,
    /// Every object materialized during the pass, results included
    pub entities: Vec<EntityRef>,
}

/// Look up `wire_id`, creating and registering a shell when absent.
fn resolve(
    input: &mut InputStream,
    factory: &GraphObjectFactory,
    kind: EntityKind,
    wire_id: i64,
) -> ProtocolResult<EntityRef> {
    if input.reference_map().is_none() {
        input.set_reference_map(ReferenceMap::new());
    }
    let map = input
        .reference_map_mut()
        .ok_or_else(|| ProtocolError::malformed("reference map unavailable"))?;

    if let Some(existing) = map.get(&wire_id) {
        if existing.kind() != kind {
            return Err(ProtocolError::malformed(format!(
                "entity {} referenced as {} but decoded as {}",
                wire_id,
                kind,
                existing.kind()
            )));
        }
        return Ok(existing.clone());
    }

    let shell = factory
        .create_shell(kind, wire_id)
        .ok_or_else(|| ProtocolError::malformed(format!("cannot materialize {} entity", kind)))?;
    map.insert(wire_id, shell.clone());
    Ok(shell)
}

// descriptor id + null flag
const MIN_ATTRIBUTE_SIZE: usize = 5;
// edge entity id
const MIN_EDGE_REF_SIZE: usize = 8;
// result flag + kind + wire id + record length
const MIN_STREAM_ENTRY_SIZE: usize = 14;

/// Capacity for `count` wire items, never more than the remaining bytes can hold.
fn bounded_capacity(count: i32, input: &InputStream, item_size: usize) -> usize {
    (count.max(0) as usize).min(input.available() / item_size)
}

/// Decode one entity record into an already-registered object.
fn read_entity_record(
    input: &mut InputStream,
    entity: &EntityRef,
    factory: &GraphObjectFactory,
) -> ProtocolResult<()> {
    let start = input.position();
    let declared = input.read_i32()?;

    let _is_new = input.read_bool()?;
    let kind = EntityKind::from_u8(input.read_u8()?);
    if kind != entity.kind() {
        return Err(ProtocolError::malformed(format!(
            "record kind {} does not match entity kind {}",
            kind,
            entity.kind()
        )));
    }
    let entity_id = input.read_i64()?;
    let version = input.read_i32()?;
    let type_id = input.read_i32()?;
    let metadata = factory.metadata();
    let entity_type = match type_id {
        0 => None,
        id => metadata.entity_type_by_id(id),
    };

    let attr_count = input.read_i32()?;
    let mut attributes = Vec::with_capacity(bounded_capacity(attr_count, input, MIN_ATTRIBUTE_SIZE));
    for _ in 0..attr_count {
        attributes.push(read_attribute(input, metadata)?);
    }

    let body = match kind {
        EntityKind::Node | EntityKind::Graph => {
            let edge_count = input.read_i32()?;
            let mut edges = Vec::with_capacity(bounded_capacity(edge_count, input, MIN_EDGE_REF_SIZE));
            for _ in 0..edge_count {
                let edge_id = input.read_i64()?;
                edges.push(resolve(input, factory, EntityKind::Edge, edge_id)?);
            }
            for edge in &edges {
                entity.add_edge(edge);
            }
            None
        }
        EntityKind::Edge => {
            let direction = Direction::from_u8(input.read_u8()?);
            let from_id = input.read_i64()?;
            let from = resolve(input, factory, EntityKind::Node, from_id)?;
            let to_id = input.read_i64()?;
            let to = resolve(input, factory, EntityKind::Node, to_id)?;
            from.add_edge(entity);
            if !Arc::ptr_eq(&from, &to) {
                to.add_edge(entity);
            }
            Some(EntityBody::Edge {
                direction,
                from: Some(from),
                to: Some(to),
            })
        }
        EntityKind::Invalid => {
            return Err(ProtocolError::malformed("record of invalid kind"));
        }
    };

    let consumed = input.position() - start;
    if declared < 0 || consumed != declared as usize {
        return Err(ProtocolError::LengthMismatch {
            declared: declared.max(0) as usize,
            actual: consumed,
        });
    }

    let mut state = entity.state_mut();
    state.entity_id = entity_id;
    state.version = version;
    state.is_new = false;
    state.is_initialized = true;
    state.entity_type = entity_type;
    state.attributes = attributes;
    if let Some(body) = body {
        state.body = body;
    }
    Ok(())
}

/// Skip a record of a kind this client does not materialize.
fn skip_entity_record(input: &mut InputStream) -> ProtocolResult<()> {
    input.mark();
    let declared = input.read_i32()?;
    input.reset();
    if declared < 4 {
        return Err(ProtocolError::malformed(format!(
            "entity record length {}",
            declared
        )));
    }
    input.skip(declared as usize)
}

/// Decode an entity stream: total count, result count, then entities.
///
/// Uses the stream's reference map if one is set, otherwise installs a fresh
/// one; the map is taken back out when the pass completes.
pub fn decode_entity_stream(
    input: &mut InputStream,
    factory: &GraphObjectFactory,
) -> ProtocolResult<DecodedGraph> {
    let total_count = input.read_i32()?;
    let result_count = input.read_i32()?;
    if input.reference_map().is_none() {
        input.set_reference_map(ReferenceMap::new());
    }

    let mut results = Vec::with_capacity(bounded_capacity(result_count, input, MIN_STREAM_ENTRY_SIZE));
    for _ in 0..total_count {
        let is_result = input.read_bool()?;
        let kind = EntityKind::from_u8(input.read_u8()?);
        let wire_id = input.read_i64()?;

        match kind {
            EntityKind::Invalid => {
                warn!(wire_id, "skipping entity of unsupported kind");
                skip_entity_record(input)?;
                continue;
            }
            EntityKind::Node | EntityKind::Edge | EntityKind::Graph => {}
        }

        let entity = resolve(input, factory, kind, wire_id)?;
        read_entity_record(input, &entity, factory)?;
        if is_result {
            results.push(entity);
        }
    }

    let entities: Vec<EntityRef> = input
        .take_reference_map()
        .map(|map| map.into_values().collect())
        .unwrap_or_default();
    trace!(
        total_count,
        result_count,
        materialized = entities.len(),
        "decoded entity stream"
    );

    Ok(DecodedGraph {
        total_count,
        result_count,
        results,
        entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, GraphMetadata};

    struct Fixture {
        metadata: Arc<GraphMetadata>,
        factory: GraphObjectFactory,
    }

    fn fixture() -> Fixture {
        let metadata = Arc::new(GraphMetadata::new());
        metadata.update(
            vec![
                AttributeDescriptor::with_id(1, "name", AttributeType::String, false),
                AttributeDescriptor::with_id(2, "age", AttributeType::Integer, false),
                AttributeDescriptor::with_id(3, "since", AttributeType::Date, false),
            ],
            vec![EntityType::new(10, "testnode", SystemType::NodeType)],
            vec![EntityType::new(20, "knows", SystemType::EdgeType)],
        );
        let factory = GraphObjectFactory::new(metadata.clone());
        Fixture { metadata, factory }
    }

    /// Server-side record writer for test payloads.
    fn server_record(
        out: &mut OutputStream,
        kind: EntityKind,
        id: i64,
        attrs: &[(i32, Value)],
        tail: impl FnOnce(&mut OutputStream),
    ) {
        out.write_bool(false);
        out.write_u8(kind.as_u8());
        out.write_i64(id);
        let start = out.position();
        out.write_i32(0);
        out.write_bool(false);
        out.write_u8(kind.as_u8());
        out.write_i64(id);
        out.write_i32(1);
        out.write_i32(0);
        out.write_i32(attrs.len() as i32);
        for (desc_id, value) in attrs {
            out.write_i32(*desc_id);
            out.write_bool(false);
            let desc = AttributeDescriptor::with_id(
                *desc_id,
                "x",
                value.attribute_type().unwrap_or(AttributeType::Invalid),
                false,
            );
            write_value(out, value, &desc).unwrap();
        }
        tail(out);
        out.patch_length_at(start).unwrap();
    }

    fn mark_result(bytes: &mut [u8], record_start: usize) {
        bytes[record_start] = 1;
    }

    /// Two nodes joined by one edge; every record references the others.
    fn triangle_stream() -> Vec<u8> {
        let mut out = OutputStream::new();
        out.write_i32(3);
        out.write_i32(1);

        let first = out.position();
        server_record(
            &mut out,
            EntityKind::Node,
            100,
            &[(1, Value::from("Bruce-Wayne"))],
            |o| {
                o.write_i32(1);
                o.write_i64(300);
            },
        );
        server_record(&mut out, EntityKind::Edge, 300, &[], |o| {
            o.write_u8(Direction::Directed.as_u8());
            o.write_i64(100);
            o.write_i64(200);
        });
        server_record(
            &mut out,
            EntityKind::Node,
            200,
            &[(1, Value::from("Alfred"))],
            |o| {
                o.write_i32(1);
                o.write_i64(300);
            },
        );
        let mut bytes = out.into_bytes().to_vec();
        mark_result(&mut bytes, first);
        bytes
    }

    #[test]
    fn test_decode_resolves_shared_references() {
        let fx = fixture();
        let mut input = InputStream::new(triangle_stream());
        let graph = decode_entity_stream(&mut input, &fx.factory).unwrap();

        assert_eq!(graph.total_count, 3);
        assert_eq!(graph.results.len(), 1);
        assert_eq!(graph.entities.len(), 3);

        let bruce = &graph.results[0];
        assert_eq!(bruce.entity_id(), 100);
        assert_eq!(bruce.attribute("name"), Some(Value::from("Bruce-Wayne")));

        let edges = bruce.edges();
        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert!(Arc::ptr_eq(&edge.from_node().unwrap(), bruce));
        let alfred = edge.to_node().unwrap();
        assert_eq!(alfred.attribute("name"), Some(Value::from("Alfred")));
        assert!(Arc::ptr_eq(&alfred.edges()[0], edge));
        assert!(alfred.is_initialized());
        assert!(!alfred.is_new());
    }

    #[test]
    fn test_independent_passes_do_not_share_objects() {
        let fx = fixture();
        let bytes = triangle_stream();
        let a = decode_entity_stream(&mut InputStream::new(bytes.clone()), &fx.factory).unwrap();
        let b = decode_entity_stream(&mut InputStream::new(bytes), &fx.factory).unwrap();

        assert!(!Arc::ptr_eq(&a.results[0], &b.results[0]));
        assert_eq!(a.results[0].attribute("name"), b.results[0].attribute("name"));
    }

    #[test]
    fn test_invalid_kind_is_skipped() {
        let fx = fixture();
        let mut out = OutputStream::new();
        out.write_i32(2);
        out.write_i32(1);
        // generic entity kind, not materialized
        server_record(&mut out, EntityKind::Invalid, 5, &[], |_| {});
        let second = out.position();
        server_record(&mut out, EntityKind::Node, 6, &[(2, Value::Integer(39))], |o| {
            o.write_i32(0);
        });
        let mut bytes = out.into_bytes().to_vec();
        bytes[second] = 1;

        let graph = decode_entity_stream(&mut InputStream::new(bytes), &fx.factory).unwrap();
        assert_eq!(graph.results.len(), 1);
        assert_eq!(graph.results[0].attribute("age"), Some(Value::Integer(39)));
    }

    #[test]
    fn test_record_length_mismatch() {
        let fx = fixture();
        let mut out = OutputStream::new();
        out.write_i32(1);
        out.write_i32(1);
        let start = out.position();
        server_record(&mut out, EntityKind::Node, 6, &[], |o| {
            o.write_i32(0);
        });
        // corrupt the declared record length
        out.write_i32_at(start + 10, 99).unwrap();

        let err = decode_entity_stream(&mut InputStream::new(out.freeze()), &fx.factory).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthMismatch { declared: 99, .. }));
    }

    #[test]
    fn test_kind_conflict_is_malformed() {
        let fx = fixture();
        let mut out = OutputStream::new();
        out.write_i32(1);
        out.write_i32(0);
        // node 7 claims edge 7, which is itself
        server_record(&mut out, EntityKind::Node, 7, &[], |o| {
            o.write_i32(1);
            o.write_i64(7);
        });
        let err = decode_entity_stream(&mut InputStream::new(out.freeze()), &fx.factory).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_oversized_attribute_count_is_eof() {
        let fx = fixture();
        let mut out = OutputStream::new();
        out.write_i32(1);
        out.write_i32(1);
        out.write_bool(true);
        out.write_u8(EntityKind::Node.as_u8());
        out.write_i64(8);
        out.write_i32(40);
        out.write_bool(false);
        out.write_u8(EntityKind::Node.as_u8());
        out.write_i64(8);
        out.write_i32(1);
        out.write_i32(0);
        out.write_i32(i32::MAX);

        let err = decode_entity_stream(&mut InputStream::new(out.freeze()), &fx.factory).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_oversized_edge_and_result_counts_are_eof() {
        let fx = fixture();
        let mut out = OutputStream::new();
        out.write_i32(1);
        out.write_i32(i32::MAX);
        server_record(&mut out, EntityKind::Node, 9, &[], |o| {
            o.write_i32(i32::MAX);
        });

        let err = decode_entity_stream(&mut InputStream::new(out.freeze()), &fx.factory).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_graph_record_carries_new_edges() {
        let fx = fixture();
        let graph = fx.factory.create_graph();
        graph.set_attribute("name", "Gotham").unwrap();
        let a = fx.factory.create_node();
        let b = fx.factory.create_node();
        let edge = fx.factory.create_edge(&a, &b, Direction::Directed).unwrap();
        graph.add_edge(&edge);

        let mut out = OutputStream::new();
        out.write_i32(1);
        out.write_i32(1);
        out.write_bool(true);
        out.write_u8(EntityKind::Graph.as_u8());
        out.write_i64(graph.virtual_id());
        write_entity(&mut out, &graph).unwrap();

        let decoded = decode_entity_stream(&mut InputStream::new(out.freeze()), &fx.factory).unwrap();
        assert_eq!(decoded.results.len(), 1);
        let copy = &decoded.results[0];
        assert_eq!(copy.kind(), EntityKind::Graph);
        assert_eq!(copy.attribute("name"), Some(Value::from("Gotham")));
        let edges = copy.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].entity_id(), edge.virtual_id());
    }

    #[test]
    fn test_write_entity_sends_modified_attributes_and_new_edges() {
        let fx = fixture();
        let a = fx.factory.create_node();
        let b = fx.factory.create_node();
        a.set_attribute("name", "Bruce-Wayne").unwrap();
        let edge = fx.factory.create_edge(&a, &b, Direction::Directed).unwrap();

        let mut out = OutputStream::new();
        write_entity(&mut out, &a).unwrap();
        let mut input = InputStream::new(out.freeze());

        let len = input.read_i32().unwrap();
        assert_eq!(len as usize, input.len());
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_u8().unwrap(), EntityKind::Node.as_u8());
        assert_eq!(input.read_i64().unwrap(), a.virtual_id());
        assert_eq!(input.read_i32().unwrap(), 0);
        assert_eq!(input.read_i32().unwrap(), 0);
        assert_eq!(input.read_i32().unwrap(), 1);
        let attr = read_attribute(&mut input, &fx.metadata).unwrap();
        assert_eq!(attr.value(), &Value::from("Bruce-Wayne"));
        assert_eq!(input.read_i32().unwrap(), 1);
        assert_eq!(input.read_i64().unwrap(), edge.virtual_id());
        assert_eq!(input.available(), 0);
    }

    #[test]
    fn test_write_edge_endpoints() {
        let fx = fixture();
        let a = fx.factory.create_node();
        let b = fx.factory.create_node();
        let edge = fx.factory.create_edge(&a, &b, Direction::Undirected).unwrap();

        let mut out = OutputStream::new();
        write_entity(&mut out, &edge).unwrap();
        let bytes = out.freeze();
        let tail = &bytes[bytes.len() - 17..];
        assert_eq!(tail[0], Direction::Undirected.as_u8());
        assert_eq!(&tail[1..9], &a.virtual_id().to_be_bytes());
        assert_eq!(&tail[9..17], &b.virtual_id().to_be_bytes());
    }

    #[test]
    fn test_temporal_values() {
        let desc = AttributeDescriptor::with_id(1, "t", AttributeType::TimeStamp, false);
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 45, 10, 250)
            .unwrap();
        let mut out = OutputStream::new();
        write_value(&mut out, &Value::TimeStamp(ts), &desc).unwrap();
        assert_eq!(out.len(), 11);
        let mut input = InputStream::new(out.freeze());
        assert_eq!(
            read_value(&mut input, AttributeType::TimeStamp).unwrap(),
            Value::TimeStamp(ts)
        );

        // BC year and a trailing zone id
        let mut out = OutputStream::new();
        out.write_bool(false);
        out.write_i16(44);
        out.write_u8(3);
        out.write_u8(15);
        out.write_raw(&[0, 0, 0]);
        out.write_u16(0);
        out.write_i8(2);
        out.write_i16(7);
        let mut input = InputStream::new(out.freeze());
        let value = read_value(&mut input, AttributeType::Date).unwrap();
        assert_eq!(value, Value::Date(NaiveDate::from_ymd_opt(-43, 3, 15).unwrap()));
        assert_eq!(input.available(), 0);
    }

    #[test]
    fn test_number_and_lob_values() {
        let desc = AttributeDescriptor::with_id(4, "price", AttributeType::Number, false)
            .with_precision(10, 2);
        let mut out = OutputStream::new();
        write_value(&mut out, &Value::Number("12.50".into()), &desc).unwrap();
        let mut input = InputStream::new(out.freeze());
        assert_eq!(input.read_i16().unwrap(), 10);
        assert_eq!(input.read_i16().unwrap(), 2);
        assert_eq!(input.read_utf().unwrap(), "12.50");

        let mut input = InputStream::new(9000i64.to_be_bytes().to_vec());
        assert_eq!(
            read_value(&mut input, AttributeType::Clob).unwrap(),
            Value::Clob(LargeObject::reference(9000))
        );
    }

    #[test]
    fn test_descriptor_encoding() {
        let desc = AttributeDescriptor::with_id(-3, "price", AttributeType::Number, false)
            .with_precision(12, 4);
        let mut out = OutputStream::new();
        write_descriptor(&mut out, &desc).unwrap();
        let read = read_descriptor(&mut InputStream::new(out.freeze())).unwrap();
        assert_eq!(read.id(), -3);
        assert_eq!(read.name(), "price");
        assert_eq!((read.precision(), read.scale()), (12, 4));
    }
}
