use image::Rgba;

use crate::canvas::{EncodedSurface, Surface, SurfaceError};

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Whole-surface capture plus the brush style at that instant.
///
/// Not `Clone`: a snapshot belongs to exactly one stack and moves between
/// them.
#[derive(Debug, PartialEq, Eq)]
pub struct HistorySnapshot {
    image: EncodedSurface,
    color: Rgba<u8>,
    size: u32,
}

impl HistorySnapshot {
    pub fn capture(surface: &Surface, color: Rgba<u8>, size: u32) -> Result<Self, SurfaceError> {
        Ok(Self {
            image: surface.snapshot()?,
            color,
            size,
        })
    }

    pub fn from_parts(image: EncodedSurface, color: Rgba<u8>, size: u32) -> Self {
        Self { image, color, size }
    }

    pub fn into_parts(self) -> (EncodedSurface, Rgba<u8>, u32) {
        (self.image, self.color, self.size)
    }

    pub fn image(&self) -> &EncodedSurface {
        &self.image
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn memory_size(&self) -> usize {
        self.image.memory_size()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackKind {
    Undo,
    Redo,
}

impl StackKind {
    pub fn opposite(self) -> Self {
        match self {
            StackKind::Undo => StackKind::Redo,
            StackKind::Redo => StackKind::Undo,
        }
    }
}

// ============================================================================
// HISTORY MANAGER - unbounded undo/redo stacks of whole snapshots
// ============================================================================

#[derive(Debug, Default)]
pub struct HistoryManager {
    undo_stack: Vec<HistorySnapshot>,
    redo_stack: Vec<HistorySnapshot>,
    /// Running byte total across both stacks.
    total_memory: usize,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn stack_mut(&mut self, kind: StackKind) -> &mut Vec<HistorySnapshot> {
        match kind {
            StackKind::Undo => &mut self.undo_stack,
            StackKind::Redo => &mut self.redo_stack,
        }
    }

    fn stack(&self, kind: StackKind) -> &Vec<HistorySnapshot> {
        match kind {
            StackKind::Undo => &self.undo_stack,
            StackKind::Redo => &self.redo_stack,
        }
    }

    pub fn push(&mut self, kind: StackKind, snapshot: HistorySnapshot) {
        self.total_memory += snapshot.memory_size();
        self.stack_mut(kind).push(snapshot);
    }

    fn pop(&mut self, kind: StackKind) -> Option<HistorySnapshot> {
        let snapshot = self.stack_mut(kind).pop()?;
        self.total_memory = self.total_memory.saturating_sub(snapshot.memory_size());
        Some(snapshot)
    }

    /// A new action: push onto the undo stack and forget the redo branch.
    pub fn record(&mut self, snapshot: HistorySnapshot) {
        for dropped in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
        }
        self.push(StackKind::Undo, snapshot);
    }

    /// Pop the newest snapshot of `from` and park `current` on `to` so the
    /// step can be reversed.  Empty `from` is a silent no-op that drops
    /// `current`.
    pub fn restore(
        &mut self,
        from: StackKind,
        to: StackKind,
        current: HistorySnapshot,
    ) -> Option<HistorySnapshot> {
        let target = self.pop(from)?;
        self.push(to, current);
        Some(target)
    }

    /// Undo the `push` that [`HistoryManager::restore`] made onto `to`, for a
    /// restore that never reached the surface.
    pub fn rollback(&mut self, to: StackKind) -> Option<HistorySnapshot> {
        self.pop(to)
    }

    pub fn depth(&self, kind: StackKind) -> usize {
        self.stack(kind).len()
    }

    pub fn peek(&self, kind: StackKind) -> Option<&HistorySnapshot> {
        self.stack(kind).last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }
}
