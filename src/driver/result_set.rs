//! Result Set
//!
//! 쿼리/조회 결과 커서

use std::fmt;

use futures::Stream;

use crate::model::EntityRef;
use crate::protocol::DecodedGraph;

// ============================================================================
// ResultSet - 결과 커서
// ============================================================================

/// Ordered list of result entities with a bidirectional cursor.
///
/// The cursor starts before the first element (position -1). Entities the
/// server sent only to satisfy references (traversal expansion) are held in
/// `related` so that edges reached through the results stay alive as long as
/// the result set does.
pub struct ResultSet {
    entities: Vec<EntityRef>,
    related: Vec<EntityRef>,
    position: isize,
    open: bool,
    result_id: i32,
}

impl ResultSet {
    /// 빈 결과 생성
    pub fn new() -> Self {
        Self::with_result_id(0)
    }

    /// 서버 결과 ID로 생성
    pub fn with_result_id(result_id: i32) -> Self {
        Self {
            entities: Vec::new(),
            related: Vec::new(),
            position: -1,
            open: true,
            result_id,
        }
    }

    /// Result set over one decoded entity stream.
    pub fn from_decoded(graph: DecodedGraph, result_id: i32) -> Self {
        Self {
            entities: graph.results,
            related: graph.entities,
            position: -1,
            open: true,
            result_id,
        }
    }

    /// 서버 결과 ID
    pub fn result_id(&self) -> i32 {
        self.result_id
    }

    /// Append an entity; used by transaction helpers.
    pub fn add_entity_to_result_set(&mut self, entity: EntityRef) {
        self.entities.push(entity);
    }

    /// 결과 개수
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 현재 위치 (-1 = 시작 전)
    pub fn position(&self) -> isize {
        self.position
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 다음 요소 존재 여부
    pub fn has_next(&self) -> bool {
        self.open && self.position + 1 < self.entities.len() as isize
    }

    /// Advance and return the element, or `None` at the end.
    pub fn next(&mut self) -> Option<EntityRef> {
        if !self.has_next() {
            return None;
        }
        self.position += 1;
        self.current()
    }

    /// Step back and return the element, or `None` at the start.
    pub fn prev(&mut self) -> Option<EntityRef> {
        if !self.open || self.position <= 0 {
            return None;
        }
        self.position -= 1;
        self.current()
    }

    /// Move the cursor by `offset`; out-of-range targets leave it unchanged.
    pub fn skip(&mut self, offset: isize) {
        if !self.open {
            return;
        }
        let Some(target) = self.position.checked_add(offset) else {
            return;
        };
        if target >= -1 && target < self.entities.len() as isize {
            self.position = target;
        }
    }

    /// 현재 요소
    pub fn current(&self) -> Option<EntityRef> {
        if !self.open || self.position < 0 {
            return None;
        }
        self.entities.get(self.position as usize).cloned()
    }

    /// 인덱스로 조회 (커서 이동 없음)
    pub fn get_at(&self, index: usize) -> Option<EntityRef> {
        if !self.open {
            return None;
        }
        self.entities.get(index).cloned()
    }

    pub fn first(&self) -> Option<EntityRef> {
        self.get_at(0)
    }

    pub fn last(&self) -> Option<EntityRef> {
        self.entities.len().checked_sub(1).and_then(|i| self.get_at(i))
    }

    /// Entities materialized alongside the results.
    pub fn related_entities(&self) -> &[EntityRef] {
        &self.related
    }

    /// 모든 결과 복사
    pub fn to_vec(&self) -> Vec<EntityRef> {
        self.entities.clone()
    }

    /// Mark the cursor unusable. Server-side query handles are closed
    /// separately.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Consume the results as an async stream.
    pub fn into_stream(self) -> impl Stream<Item = EntityRef> + Send {
        let entities = if self.open { self.entities } else { Vec::new() };
        tokio_stream::iter(entities)
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for ResultSet {
    type Item = EntityRef;
    type IntoIter = std::vec::IntoIter<EntityRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("result_id", &self.result_id)
            .field("count", &self.entities.len())
            .field("related", &self.related.len())
            .field("position", &self.position)
            .field("open", &self.open)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
