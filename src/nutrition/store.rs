use serde::Serialize;

use super::aggregator;
use super::model::{FoodEntry, MacroTotals, MealCategory};

/// A reconciliation step on the day's entries.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOp {
    /// Replace the entry with the same id in place, else append.
    Upsert(FoodEntry),
    /// Change a quantity; a result at or below zero removes the entry.
    Increment { id: String, delta: f64 },
    Remove { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Inserted,
    Replaced,
    Updated,
    Removed,
    Missing,
}

/// Applies one operation. Never leaves an entry with quantity <= 0.
pub fn apply(entries: &mut Vec<FoodEntry>, op: EntryOp) -> EntryOutcome {
    match op {
        EntryOp::Upsert(entry) => match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry;
                EntryOutcome::Replaced
            }
            None => {
                entries.push(entry);
                EntryOutcome::Inserted
            }
        },
        EntryOp::Increment { id, delta } => {
            let Some(pos) = entries.iter().position(|e| e.id == id) else {
                return EntryOutcome::Missing;
            };
            let next = entries[pos].quantity + delta;
            if next <= 0.0 {
                entries.remove(pos);
                EntryOutcome::Removed
            } else {
                entries[pos].quantity = next;
                EntryOutcome::Updated
            }
        }
        EntryOp::Remove { id } => {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() < before {
                EntryOutcome::Removed
            } else {
                EntryOutcome::Missing
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub category: MealCategory,
    pub entries: Vec<FoodEntry>,
}

/// The day's food entries, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct FoodEntryStore {
    entries: Vec<FoodEntry>,
}

impl FoodEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[FoodEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&FoodEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn apply(&mut self, op: EntryOp) -> EntryOutcome {
        apply(&mut self.entries, op)
    }

    pub fn add_manual(&mut self, entry: FoodEntry) -> EntryOutcome {
        self.apply(EntryOp::Upsert(entry))
    }

    pub fn quick_add(&mut self, template: &FoodEntry) -> EntryOutcome {
        if self.get(&template.id).is_some() {
            return self.apply(EntryOp::Increment {
                id: template.id.clone(),
                delta: 1.0,
            });
        }
        self.apply(EntryOp::Upsert(FoodEntry {
            quantity: 1.0,
            ..template.clone()
        }))
    }

    pub fn remove_one_unit(&mut self, id: &str) -> EntryOutcome {
        self.apply(EntryOp::Increment {
            id: id.to_string(),
            delta: -1.0,
        })
    }

    pub fn remove(&mut self, id: &str) -> EntryOutcome {
        self.apply(EntryOp::Remove { id: id.to_string() })
    }

    pub fn totals(&self) -> MacroTotals {
        aggregator::totals(&self.entries)
    }

    /// Non-empty groups in meal order; insertion order within a group.
    pub fn group_by_category(&self) -> Vec<CategoryGroup> {
        MealCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let entries: Vec<FoodEntry> = self
                    .entries
                    .iter()
                    .filter(|e| e.category == category)
                    .cloned()
                    .collect();
                (!entries.is_empty()).then_some(CategoryGroup { category, entries })
            })
            .collect()
    }
}
