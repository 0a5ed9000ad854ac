//! Pending per-document mutations
//!
//! Writers queue changes between commits. At commit the whole vector is
//! applied in submission order and then cleared.

use super::DocId;

/// Mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Overwrite with the boolean coercion of the operand
    SetValue,
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Reset to false
    ClearDoc,
}

/// Arithmetic update operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl From<ArithmeticOp> for ChangeKind {
    fn from(op: ArithmeticOp) -> Self {
        match op {
            ArithmeticOp::Add => ChangeKind::Add,
            ArithmeticOp::Subtract => ChangeKind::Subtract,
            ArithmeticOp::Multiply => ChangeKind::Multiply,
            ArithmeticOp::Divide => ChangeKind::Divide,
        }
    }
}

/// One pending mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub doc: DocId,
    pub kind: ChangeKind,
    pub operand: i64,
}

impl Change {
    /// Overwrite `doc` with `value`
    pub fn set_value(doc: DocId, value: bool) -> Self {
        Self {
            doc,
            kind: ChangeKind::SetValue,
            operand: value as i64,
        }
    }

    /// Recompute `doc` from its current value
    pub fn arithmetic(doc: DocId, op: ArithmeticOp, operand: i64) -> Self {
        Self {
            doc,
            kind: op.into(),
            operand,
        }
    }

    /// Reset `doc` to false
    pub fn clear_doc(doc: DocId) -> Self {
        Self {
            doc,
            kind: ChangeKind::ClearDoc,
            operand: 0,
        }
    }

    /// Value `doc` holds after this change, given its current value.
    ///
    /// Arithmetic runs on the current value widened to `i64`, wraps on
    /// overflow, and is truncated to `i8` before coercion (nonzero is true).
    /// Division by zero keeps the current value.
    pub fn resolve(&self, current: bool) -> bool {
        match self.kind {
            ChangeKind::SetValue => self.operand != 0,
            ChangeKind::ClearDoc => false,
            kind => apply_arithmetic(current as i8, kind, self.operand) != 0,
        }
    }
}

fn apply_arithmetic(current: i8, kind: ChangeKind, operand: i64) -> i8 {
    let value = current as i64;
    let result = match kind {
        ChangeKind::Add => value.wrapping_add(operand),
        ChangeKind::Subtract => value.wrapping_sub(operand),
        ChangeKind::Multiply => value.wrapping_mul(operand),
        ChangeKind::Divide => match value.checked_div(operand) {
            Some(v) => v,
            None => return current,
        },
        ChangeKind::SetValue | ChangeKind::ClearDoc => value,
    };
    result as i8
}

/// Ordered queue of pending changes
#[derive(Debug, Default, Clone)]
pub struct ChangeVector {
    changes: Vec<Change>,
}

impl ChangeVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes in submission order
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Drops queued changes for which `keep` returns false
    pub fn retain<F: FnMut(&Change) -> bool>(&mut self, keep: F) {
        self.changes.retain(keep);
    }

    /// Bytes reserved for queued changes
    pub fn allocated_bytes(&self) -> usize {
        self.changes.capacity() * std::mem::size_of::<Change>()
    }
}
