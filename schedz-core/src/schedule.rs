//! Schedules and the condition bit set.

use serde::{Deserialize, Serialize};

use crate::namespace::GlobalId;
use crate::task::Task;

/// Number of distinguishable condition bits.
pub const MAX_CONDITIONS: usize = 256;

const WORDS: usize = MAX_CONDITIONS / 64;

// ---------------------------------------------------------------------------
// Condition Bits
// ---------------------------------------------------------------------------

/// Fixed-size set of condition bits, indexed by global condition ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConditionBits([u64; WORDS]);

impl ConditionBits {
    /// Empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self([0; WORDS])
    }

    fn slot(bit: usize) -> Option<(usize, u64)> {
        (bit < MAX_CONDITIONS).then(|| (bit / 64, 1u64 << (bit % 64)))
    }

    /// Set `bit`; out-of-range bits are ignored.
    pub fn set(&mut self, bit: usize) {
        if let Some((w, m)) = Self::slot(bit) {
            self.0[w] |= m;
        }
    }

    /// Clear `bit`.
    pub fn clear(&mut self, bit: usize) {
        if let Some((w, m)) = Self::slot(bit) {
            self.0[w] &= !m;
        }
    }

    /// Set the bit of a condition ID.
    pub fn set_condition(&mut self, id: GlobalId) {
        self.set(id.ordinal() as usize);
    }

    /// Clear the bit of a condition ID.
    pub fn clear_condition(&mut self, id: GlobalId) {
        self.clear(id.ordinal() as usize);
    }

    /// Whether `bit` is set.
    #[must_use]
    pub fn is_set(&self, bit: usize) -> bool {
        Self::slot(bit).is_some_and(|(w, m)| self.0[w] & m != 0)
    }

    /// Whether the bit of a condition ID is set.
    #[must_use]
    pub fn has_condition(&self, id: GlobalId) -> bool {
        self.is_set(id.ordinal() as usize)
    }

    /// Union, in place.
    pub fn or(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a |= b;
        }
    }

    /// Intersection.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0) {
            *a &= b;
        }
        out
    }

    /// Whether any bit is set in both.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0).any(|(a, b)| a & b != 0)
    }

    /// Whether no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        self.0 = [0; WORDS];
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    /// Indices of the set bits, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CONDITIONS).filter(|b| self.is_set(*b))
    }
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Named, ordered task list with an interrupt mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    name: String,
    id: GlobalId,
    tasks: Vec<Task>,
    interrupt_mask: ConditionBits,
    valid: bool,
}

impl Schedule {
    /// Empty schedule.
    #[must_use]
    pub fn new(name: impl Into<String>, id: GlobalId) -> Self {
        Self {
            name: name.into(),
            id,
            tasks: Vec::new(),
            interrupt_mask: ConditionBits::new(),
            valid: true,
        }
    }

    /// Builder-style task append.
    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Builder-style interrupt bit.
    #[must_use]
    pub fn with_interrupt(mut self, condition: GlobalId) -> Self {
        self.interrupt_mask.set_condition(condition);
        self
    }

    /// Schedule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global schedule ID.
    #[must_use]
    pub fn id(&self) -> GlobalId {
        self.id
    }

    /// Tasks in execution order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task at `index`.
    #[must_use]
    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Number of tasks.
    #[must_use]
    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Conditions that abort this schedule.
    #[must_use]
    pub fn interrupt_mask(&self) -> &ConditionBits {
        &self.interrupt_mask
    }

    /// Whether any of `conditions` is in the interrupt mask.
    #[must_use]
    pub fn is_interrupted_by(&self, conditions: &ConditionBits) -> bool {
        self.interrupt_mask.intersects(conditions)
    }

    /// `false` when the loader had to patch this definition.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn push_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub(crate) fn merge_interrupts(&mut self, mask: &ConditionBits) {
        self.interrupt_mask.or(mask);
    }

    pub(crate) fn mark_invalid(&mut self) {
        self.valid = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_set_clear_and_bounds() {
        let mut bits = ConditionBits::new();
        bits.set(0);
        bits.set(65);
        bits.set(255);
        bits.set(256);
        assert!(bits.is_set(0) && bits.is_set(65) && bits.is_set(255));
        assert!(!bits.is_set(256));
        assert_eq!(bits.count(), 3);
        bits.clear(65);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 255]);
        bits.clear_all();
        assert!(bits.is_empty());
    }

    #[test]
    fn union_and_intersection() {
        let mut a = ConditionBits::new();
        a.set(3);
        let mut b = ConditionBits::new();
        b.set(130);
        assert!(!a.intersects(&b));
        a.or(&b);
        assert!(a.intersects(&b));
        assert_eq!(a.and(&b).iter().collect::<Vec<_>>(), vec![130]);
    }

    #[test]
    fn schedule_interrupts() {
        let cond = GlobalId::new(7);
        let sched = Schedule::new("SCHED_X", GlobalId::new(0)).with_interrupt(cond);
        let mut now = ConditionBits::new();
        assert!(!sched.is_interrupted_by(&now));
        now.set_condition(cond);
        assert!(sched.is_interrupted_by(&now));
        assert!(sched.is_valid());
        assert_eq!(sched.num_tasks(), 0);
    }
}
