//! Catalog/store merge rule.
//!
//! Catalog content fields always win; `favorite` and `lastUsed` stick to
//! the stored record; `custom` is forced to `false`.

use crate::model::spell::Spell;
use log::warn;
use std::collections::HashMap;

/// Counts of what one reconciliation pass wrote or skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    /// Candidates whose id belongs to a stored custom spell.
    pub skipped_custom: usize,
}

impl ReconcileReport {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Records to upsert plus the matching report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub records: Vec<Spell>,
    pub report: ReconcileReport,
}

/// Merges one catalog candidate with the stored record of the same id.
///
/// Every field is assigned explicitly so a field added to [`Spell`] must be
/// given a merge rule here before this compiles.
pub fn merge_catalog_spell(candidate: Spell, existing: Option<&Spell>) -> Spell {
    let Spell {
        id,
        name,
        level,
        school,
        classes,
        casting_time,
        range,
        components,
        duration,
        description,
        edition,
        custom: _,
        favorite,
        last_used,
    } = candidate;

    let (favorite, last_used) = match existing {
        Some(stored) => (stored.favorite, stored.last_used),
        None => (favorite, last_used),
    };

    Spell {
        id,
        name,
        level,
        school,
        classes,
        casting_time,
        range,
        components,
        duration,
        description,
        edition,
        custom: false,
        favorite,
        last_used,
    }
}

/// Computes the full upsert set for `candidates` against `existing`.
///
/// Pure: nothing is written. When a candidate id repeats, the later
/// candidate replaces the earlier one in the plan.
pub fn reconcile(candidates: Vec<Spell>, existing: &[Spell]) -> ReconcilePlan {
    let stored: HashMap<&str, &Spell> = existing
        .iter()
        .map(|spell| (spell.id.as_str(), spell))
        .collect();

    let mut plan = ReconcilePlan::default();
    let mut planned: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let current = stored.get(candidate.id.as_str()).copied();
        if let Some(spell) = current.filter(|spell| spell.custom) {
            warn!(
                "event=catalog_reconcile module=catalog status=skip reason=custom_id_collision id={}",
                spell.id
            );
            plan.report.skipped_custom += 1;
            continue;
        }

        let merged = merge_catalog_spell(candidate, current);
        if let Some(&position) = planned.get(&merged.id) {
            plan.records[position] = merged;
            continue;
        }

        if current.is_some() {
            plan.report.updated += 1;
        } else {
            plan.report.inserted += 1;
        }
        planned.insert(merged.id.clone(), plan.records.len());
        plan.records.push(merged);
    }

    plan
}
