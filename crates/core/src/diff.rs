//! # Diff Module
//!
//! Null-aware column diff used by the change-capture pipeline.
//!
//! - INSERT: one change per tracked column per record, old value null.
//! - DELETE: the inverse, new value null.
//! - UPDATE: old and new rows joined by primary key; a change is produced
//!   only where the values differ (two nulls are equal, null vs value is not).

use crate::audit::ColumnChange;
use crate::entity::{EntityDescriptor, Tracked};
use std::collections::HashMap;

/// Null-aware inequality
pub fn values_differ(old: Option<&str>, new: Option<&str>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

pub fn insert_changes<T: Tracked>(desc: &EntityDescriptor, records: &[T]) -> Vec<ColumnChange> {
    let mut changes = Vec::new();
    for record in records {
        let key = record.record_key();
        for column in &desc.tracked_columns {
            changes.push(ColumnChange {
                record_id: key.clone(),
                column_name: column.name.clone(),
                old_value: None,
                new_value: record.column_value(&column.name),
                data_type: column.data_type,
            });
        }
    }
    changes
}

pub fn delete_changes<T: Tracked>(desc: &EntityDescriptor, records: &[T]) -> Vec<ColumnChange> {
    let mut changes = Vec::new();
    for record in records {
        let key = record.record_key();
        for column in &desc.tracked_columns {
            changes.push(ColumnChange {
                record_id: key.clone(),
                column_name: column.name.clone(),
                old_value: record.column_value(&column.name),
                new_value: None,
                data_type: column.data_type,
            });
        }
    }
    changes
}

/// Records present only on one side of the join produce no changes.
pub fn update_changes<T: Tracked>(
    desc: &EntityDescriptor,
    old: &[T],
    new: &[T],
) -> Vec<ColumnChange> {
    let before: HashMap<String, &T> = old.iter().map(|r| (r.record_key(), r)).collect();

    let mut changes = Vec::new();
    for after in new {
        let key = after.record_key();
        let Some(prev) = before.get(&key) else {
            continue;
        };
        for column in &desc.tracked_columns {
            let old_value = prev.column_value(&column.name);
            let new_value = after.column_value(&column.name);
            if values_differ(old_value.as_deref(), new_value.as_deref()) {
                changes.push(ColumnChange {
                    record_id: key.clone(),
                    column_name: column.name.clone(),
                    old_value,
                    new_value,
                    data_type: column.data_type,
                });
            }
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ColumnType, TrackedColumn};

    struct Row {
        id: u32,
        name: Option<&'static str>,
        amount: Option<&'static str>,
    }

    impl Tracked for Row {
        fn record_key(&self) -> String {
            self.id.to_string()
        }

        fn column_value(&self, column: &str) -> Option<String> {
            match column {
                "name" => self.name.map(str::to_string),
                "amount" => self.amount.map(str::to_string),
                _ => None,
            }
        }
    }

    fn desc() -> EntityDescriptor {
        EntityDescriptor {
            schema: "Data".into(),
            name: "Rows".into(),
            table: "rows".into(),
            key_column: "id".into(),
            modified_column: None,
            tracked_columns: vec![
                TrackedColumn::new("name", ColumnType::Text),
                TrackedColumn::new("amount", ColumnType::Decimal),
            ],
        }
    }

    #[test]
    fn test_values_differ_null_aware() {
        assert!(!values_differ(None, None));
        assert!(!values_differ(Some("a"), Some("a")));
        assert!(values_differ(Some("a"), Some("b")));
        assert!(values_differ(None, Some("a")));
        assert!(values_differ(Some("a"), None));
    }

    #[test]
    fn test_insert_changes_one_per_column_per_record() {
        let rows = vec![
            Row { id: 1, name: Some("a"), amount: Some("10") },
            Row { id: 2, name: None, amount: Some("20") },
        ];
        let changes = insert_changes(&desc(), &rows);
        assert_eq!(changes.len(), 4);
        assert!(changes.iter().all(|c| c.old_value.is_none()));
        assert_eq!(changes[2].record_id, "2");
        assert_eq!(changes[2].new_value, None);
    }

    #[test]
    fn test_delete_changes_are_inverse() {
        let rows = vec![Row { id: 7, name: Some("x"), amount: Some("1") }];
        let changes = delete_changes(&desc(), &rows);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.new_value.is_none()));
        assert_eq!(changes[0].old_value.as_deref(), Some("x"));
    }

    #[test]
    fn test_update_changes_only_differing_columns() {
        let old = vec![
            Row { id: 1, name: Some("a"), amount: Some("10") },
            Row { id: 2, name: None, amount: None },
        ];
        let new = vec![
            Row { id: 2, name: None, amount: Some("5") },
            Row { id: 1, name: Some("a"), amount: Some("10") },
        ];
        let changes = update_changes(&desc(), &old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].record_id, "2");
        assert_eq!(changes[0].column_name, "amount");
        assert_eq!(changes[0].old_value, None);
        assert_eq!(changes[0].new_value.as_deref(), Some("5"));
        assert_eq!(changes[0].data_type, ColumnType::Decimal);
    }

    #[test]
    fn test_update_without_matching_key_is_ignored() {
        let old = vec![Row { id: 1, name: Some("a"), amount: None }];
        let new = vec![Row { id: 9, name: Some("b"), amount: None }];
        assert!(update_changes(&desc(), &old, &new).is_empty());
    }
}
