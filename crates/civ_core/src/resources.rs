//! Resource ledger.
//!
//! Tracks the stockpile of every resource kind together with its capacity
//! and the net rate applied on the last tick. The set of kinds is fixed
//! when the ledger is created from content and never grows afterwards.
//!
//! All calculations use fixed-point math for deterministic simulation.
//! Resources are always visited in lexicographic order of their id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::ResourceData;
use crate::error::{InvariantViolation, ValidationError};
use crate::ids::ResourceKind;
use crate::math::{clamp_amount, decimal_map_serde, fixed_serde, option_fixed_serde, Amount, Fixed};

/// A set of resource quantities, used for costs, production and requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceBundle(#[serde(with = "decimal_map_serde")] BTreeMap<ResourceKind, Amount>);

impl ResourceBundle {
    /// Create an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, resource: impl Into<ResourceKind>, amount: Amount) -> Self {
        self.0.insert(resource.into(), amount);
        self
    }

    /// Quantity of one resource, zero if absent.
    #[must_use]
    pub fn get(&self, resource: &str) -> Amount {
        self.0.get(resource).copied().unwrap_or(Fixed::ZERO)
    }

    /// Iterate entries in lexicographic resource order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, &Amount)> {
        self.0.iter()
    }

    /// Resource kinds mentioned by this bundle.
    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.0.keys()
    }

    /// Whether the bundle has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every quantity multiplied by `factor`, saturating at the range of
    /// [`Fixed`].
    #[must_use]
    pub fn scaled(&self, factor: u32) -> Self {
        let factor = Fixed::saturating_from_num(factor);
        Self(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.saturating_mul(factor)))
                .collect(),
        )
    }
}

impl<K: Into<ResourceKind>> FromIterator<(K, Amount)> for ResourceBundle {
    fn from_iter<T: IntoIterator<Item = (K, Amount)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Ledger entry for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Current stockpile. Never negative.
    #[serde(with = "fixed_serde")]
    pub amount: Amount,
    /// Storage limit, `None` for unbounded.
    #[serde(with = "option_fixed_serde")]
    pub capacity: Option<Amount>,
    /// Net delta requested on the last tick (before clamping).
    #[serde(with = "fixed_serde")]
    pub rate: Fixed,
}

impl ResourceEntry {
    /// Create an entry with zero rate.
    #[must_use]
    pub const fn new(amount: Amount, capacity: Option<Amount>) -> Self {
        Self {
            amount,
            capacity,
            rate: Fixed::ZERO,
        }
    }

    /// Space left before the capacity is reached.
    #[must_use]
    pub fn headroom(&self) -> Option<Amount> {
        self.capacity.map(|cap| (cap - self.amount).max(Fixed::ZERO))
    }
}

/// Per-tick input to [`ResourceLedger::apply_tick`].
///
/// Rates and capacities are computed up front from the state at the start
/// of the tick, so the order resources are processed in cannot change the
/// result of the arithmetic itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateSheet {
    /// Net delta per resource.
    pub rates: BTreeMap<ResourceKind, Fixed>,
    /// Effective capacity per resource.
    pub capacities: BTreeMap<ResourceKind, Option<Amount>>,
    /// Positive (gross) income per resource, for statistics.
    pub gross: BTreeMap<ResourceKind, Fixed>,
}

/// What happened to the ledger during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerReport {
    /// Resources whose unclamped amount would have gone negative,
    /// with the size of the deficit.
    pub shortfalls: Vec<(ResourceKind, Amount)>,
    /// Amount discarded because it did not fit under the capacity.
    pub discarded: Vec<(ResourceKind, Amount)>,
}

impl LedgerReport {
    /// Whether `resource` ran short this tick.
    #[must_use]
    pub fn ran_short(&self, resource: &str) -> bool {
        self.shortfalls.iter().any(|(k, _)| k.as_str() == resource)
    }
}

/// Mapping of resource kind to stockpile, capacity and rate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    entries: BTreeMap<ResourceKind, ResourceEntry>,
}

impl ResourceLedger {
    /// Create a ledger holding every resource in the content at its
    /// starting amount.
    #[must_use]
    pub fn from_content(resources: &[ResourceData]) -> Self {
        let entries = resources
            .iter()
            .map(|r| {
                let amount = clamp_amount(r.starting_amount, r.base_capacity);
                (r.id.clone(), ResourceEntry::new(amount, r.base_capacity))
            })
            .collect();
        Self { entries }
    }

    /// Look up one entry.
    #[must_use]
    pub fn get(&self, resource: &str) -> Option<&ResourceEntry> {
        self.entries.get(resource)
    }

    /// Current amount of a resource (zero for unknown kinds).
    #[must_use]
    pub fn amount(&self, resource: &str) -> Amount {
        self.entries
            .get(resource)
            .map_or(Fixed::ZERO, |entry| entry.amount)
    }

    /// Iterate entries in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, &ResourceEntry)> {
        self.entries.iter()
    }

    /// Number of resource kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no kinds at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that every quantity in `cost` is available.
    ///
    /// Pure: never mutates. Reports the first short resource in
    /// lexicographic order.
    pub fn check_affordable(&self, cost: &ResourceBundle) -> Result<(), ValidationError> {
        for (resource, required) in cost.iter() {
            let Some(entry) = self.entries.get(resource) else {
                return Err(ValidationError::UnknownType {
                    id: resource.to_string(),
                });
            };
            if entry.amount < *required {
                return Err(ValidationError::InsufficientResources {
                    resource: resource.clone(),
                    required: *required,
                    available: entry.amount,
                });
            }
        }
        Ok(())
    }

    /// Deduct every quantity in `cost`, or nothing at all.
    pub fn deduct(&mut self, cost: &ResourceBundle) -> Result<(), ValidationError> {
        self.check_affordable(cost)?;
        for (resource, required) in cost.iter() {
            if let Some(entry) = self.entries.get_mut(resource) {
                entry.amount -= *required;
            }
        }
        Ok(())
    }

    /// Add to a stockpile, discarding anything above capacity.
    ///
    /// Returns the amount actually stored.
    pub fn credit(&mut self, resource: &str, amount: Amount) -> Amount {
        let Some(entry) = self.entries.get_mut(resource) else {
            return Fixed::ZERO;
        };
        let before = entry.amount;
        entry.amount = clamp_amount(before.saturating_add(amount.max(Fixed::ZERO)), entry.capacity);
        entry.amount - before
    }

    /// Apply one tick of rates: `amount = clamp(amount + rate, 0, capacity)`.
    ///
    /// Capacities from the sheet replace the stored ones first. Overflow is
    /// discarded, not carried over. Unbounded stockpiles saturate at
    /// [`Fixed::MAX`] instead of wrapping.
    pub fn apply_tick(&mut self, sheet: &RateSheet) -> LedgerReport {
        let mut report = LedgerReport::default();

        for (resource, entry) in &mut self.entries {
            if let Some(capacity) = sheet.capacities.get(resource) {
                entry.capacity = *capacity;
            }

            let rate = sheet.rates.get(resource).copied().unwrap_or(Fixed::ZERO);
            entry.rate = rate;

            let unclamped = entry.amount.saturating_add(rate);
            if unclamped < Fixed::ZERO {
                report
                    .shortfalls
                    .push((resource.clone(), unclamped.saturating_neg()));
            }
            if let Some(cap) = entry.capacity {
                if unclamped > cap {
                    report
                        .discarded
                        .push((resource.clone(), unclamped.saturating_sub(cap)));
                }
            }
            entry.amount = clamp_amount(unclamped, entry.capacity);
        }

        report
    }

    /// Verify non-negativity and capacity for every entry.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (resource, entry) in &self.entries {
            if entry.amount < Fixed::ZERO {
                return Err(InvariantViolation::NegativeAmount {
                    resource: resource.clone(),
                    amount: entry.amount,
                });
            }
            if let Some(capacity) = entry.capacity {
                if entry.amount > capacity {
                    return Err(InvariantViolation::AboveCapacity {
                        resource: resource.clone(),
                        amount: entry.amount,
                        capacity,
                    });
                }
            }
        }
        Ok(())
    }

    /// Overwrite an amount directly. Test and scenario setup only; the
    /// value is still clamped into range.
    pub fn set_amount(&mut self, resource: &str, amount: Amount) {
        if let Some(entry) = self.entries.get_mut(resource) {
            entry.amount = clamp_amount(amount, entry.capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn ledger() -> ResourceLedger {
        let mut ledger = ResourceLedger::default();
        ledger
            .entries
            .insert("food".into(), ResourceEntry::new(fixed(20), Some(fixed(100))));
        ledger
            .entries
            .insert("wood".into(), ResourceEntry::new(fixed(100), None));
        ledger
    }

    #[test]
    fn test_deduct_is_all_or_nothing() {
        let mut ledger = ledger();
        let cost = ResourceBundle::new()
            .with("food", fixed(10))
            .with("wood", fixed(500));

        let err = ledger.deduct(&cost).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientResources { ref resource, .. } if resource.as_str() == "wood"
        ));
        assert_eq!(ledger.amount("food"), fixed(20));
        assert_eq!(ledger.amount("wood"), fixed(100));

        let cost = ResourceBundle::new()
            .with("food", fixed(10))
            .with("wood", fixed(50));
        ledger.deduct(&cost).unwrap();
        assert_eq!(ledger.amount("food"), fixed(10));
        assert_eq!(ledger.amount("wood"), fixed(50));
    }

    #[test]
    fn test_unknown_cost_resource_is_rejected() {
        let ledger = ledger();
        let cost = ResourceBundle::new().with("mana", fixed(1));
        assert!(matches!(
            ledger.check_affordable(&cost),
            Err(ValidationError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_apply_tick_clamps_to_capacity() {
        let mut ledger = ledger();
        let mut sheet = RateSheet::default();
        sheet.rates.insert("food".into(), fixed(90));

        let report = ledger.apply_tick(&sheet);
        assert_eq!(ledger.amount("food"), fixed(100));
        assert_eq!(report.discarded, vec![("food".into(), fixed(10))]);
        assert_eq!(ledger.get("food").unwrap().rate, fixed(90));
    }

    #[test]
    fn test_apply_tick_clamps_at_zero() {
        let mut ledger = ledger();
        let mut sheet = RateSheet::default();
        sheet.rates.insert("food".into(), fixed(-25));

        let report = ledger.apply_tick(&sheet);
        assert_eq!(ledger.amount("food"), Fixed::ZERO);
        assert!(report.ran_short("food"));
        assert_eq!(report.shortfalls[0].1, fixed(5));
    }

    #[test]
    fn test_apply_tick_updates_capacity_before_clamp() {
        let mut ledger = ledger();
        let mut sheet = RateSheet::default();
        sheet.rates.insert("food".into(), fixed(150));
        sheet.capacities.insert("food".into(), Some(fixed(400)));

        ledger.apply_tick(&sheet);
        assert_eq!(ledger.amount("food"), fixed(170));
        assert_eq!(ledger.get("food").unwrap().capacity, Some(fixed(400)));
    }

    #[test]
    fn test_credit_respects_capacity() {
        let mut ledger = ledger();
        assert_eq!(ledger.credit("food", fixed(200)), fixed(80));
        assert_eq!(ledger.amount("food"), fixed(100));
        assert_eq!(ledger.credit("mana", fixed(5)), Fixed::ZERO);
    }

    #[test]
    fn test_bundle_scaled() {
        let cost = ResourceBundle::new().with("food", Fixed::from_num(2.5));
        assert_eq!(cost.scaled(4).get("food"), fixed(10));
        assert_eq!(cost.get("wood"), Fixed::ZERO);
    }

    #[test]
    fn test_unbounded_amount_saturates() {
        let mut ledger = ledger();
        ledger.set_amount("wood", Fixed::MAX - fixed(5));
        let mut sheet = RateSheet::default();
        sheet.rates.insert("wood".into(), fixed(1_000_000_000));

        for _ in 0..3 {
            let report = ledger.apply_tick(&sheet);
            assert!(report.discarded.is_empty());
        }
        assert_eq!(ledger.amount("wood"), Fixed::MAX);
        assert!(ledger.check_invariants().is_ok());

        assert_eq!(ledger.credit("wood", fixed(10)), Fixed::ZERO);
        assert_eq!(ledger.amount("wood"), Fixed::MAX);
    }

    #[test]
    fn test_bundle_scaled_saturates() {
        let cost = ResourceBundle::new().with("food", fixed(1_000_000));
        assert_eq!(cost.scaled(u32::MAX).get("food"), Fixed::MAX);
    }

    #[test]
    fn test_check_invariants() {
        let mut ledger = ledger();
        assert!(ledger.check_invariants().is_ok());

        ledger.entries.get_mut("food").unwrap().amount = fixed(-1);
        assert!(matches!(
            ledger.check_invariants(),
            Err(InvariantViolation::NegativeAmount { .. })
        ));
    }
}
