use crate::store::SlotId;

use std::collections::VecDeque;

/// Stale records are tolerated up to this many before the ledger is compacted.
const COMPACTION_SLACK: usize = 64;

/// Weight accounting for the pressure-tolerant tier.
///
/// Every pressure slot is charged its value's weight and recorded in
/// installation order. When the charged weight exceeds the budget the oldest
/// slots are demoted first. Records of slots that were replaced or removed in
/// the meantime are skipped when they reach the front.
#[derive(Debug)]
pub(crate) struct PressureLedger<K> {
  budget: u64,
  weight: u64,
  live: usize,
  records: VecDeque<(K, SlotId)>,
}

impl<K> PressureLedger<K> {
  pub(crate) fn new(budget: u64) -> Self {
    Self {
      budget,
      weight: 0,
      live: 0,
      records: VecDeque::new(),
    }
  }

  #[inline]
  pub(crate) fn budget(&self) -> u64 {
    self.budget
  }

  #[inline]
  pub(crate) fn set_budget(&mut self, budget: u64) {
    self.budget = budget;
  }

  /// The total weight currently charged to live pressure slots.
  #[inline]
  pub(crate) fn weight(&self) -> u64 {
    self.weight
  }

  #[inline]
  pub(crate) fn over_budget(&self) -> bool {
    self.weight > self.budget
  }

  /// Charges a newly installed pressure slot.
  pub(crate) fn charge(&mut self, key: K, id: SlotId, weight: u64) {
    self.weight = self.weight.saturating_add(weight);
    self.live += 1;
    self.records.push_back((key, id));
  }

  /// Releases the charge of a pressure slot that left the tier.
  pub(crate) fn release(&mut self, weight: u64) {
    self.weight = self.weight.saturating_sub(weight);
    self.live = self.live.saturating_sub(1);
  }

  pub(crate) fn pop_oldest(&mut self) -> Option<(K, SlotId)> {
    self.records.pop_front()
  }

  /// Drops records whose slots are gone once they clearly outnumber the
  /// live ones.
  pub(crate) fn compact<F>(&mut self, is_current: F)
  where
    F: Fn(&K, SlotId) -> bool,
  {
    if self.records.len() <= self.live.saturating_mul(2) + COMPACTION_SLACK {
      return;
    }
    self.records.retain(|(key, id)| is_current(key, *id));
  }

  pub(crate) fn reset(&mut self) {
    self.weight = 0;
    self.live = 0;
    self.records.clear();
  }
}
