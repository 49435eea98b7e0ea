//! Expected cache schema and the reconciliation check.
//!
//! Each table's expected structure is plain data: an ordered list of
//! [`Column`]s. The database's actual structure is read back with
//! `pragma_table_info` and compared with [`is_compatible`], which knows
//! nothing about SQLite beyond the shape of that pragma's output.
//!
//! There are no incremental migrations. A table that no longer matches is
//! dropped and recreated, and its cached rows are discarded with it. The
//! cache is never the source of truth, so this only costs a slower next run.

/// Declared SQLite column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
}
impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub nullable: bool,
    pub primary: bool,
}
const fn column(name: &'static str, kind: ColumnType, nullable: bool, primary: bool) -> Column {
    Column { name, kind, nullable, primary }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

pub const FILE_SHARES: Table = Table {
    name: "file_shares",
    columns: &[
        column("file_share_id", ColumnType::Text, false, true),
        column("data_plane_endpoint", ColumnType::Text, false, true),
        column("resource_name", ColumnType::Text, false, false),
        column("resource_type", ColumnType::Text, false, false),
        column("resource_create_time", ColumnType::Text, false, false),
        column("share_name", ColumnType::Text, false, false),
        column("is_snapshot", ColumnType::Integer, false, false),
        column("snapshot_time", ColumnType::Text, true, false),
    ],
};

pub const DIRECTORY_ENTRIES: Table = Table {
    name: "directory_entries",
    columns: &[
        column("file_share_id", ColumnType::Text, false, true),
        column("data_plane_endpoint", ColumnType::Text, false, true),
        column("path", ColumnType::Text, false, true),
        column("entry_name", ColumnType::Text, false, false),
        column("is_directory", ColumnType::Integer, false, false),
    ],
};

impl Table {
    /// `CREATE TABLE` statement declaring every column with its exact type
    /// and nullability, plus a composite primary key over the key columns.
    pub fn create_sql(&self) -> String {
        let mut definitions: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.nullable {
                true => format!("{} {}", c.name, c.kind.as_sql()),
                false => format!("{} {} NOT NULL", c.name, c.kind.as_sql()),
            })
            .collect();
        let keys: Vec<&str> = self.columns.iter().filter(|c| c.primary).map(|c| c.name).collect();
        if !keys.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        format!("CREATE TABLE {} ({})", self.name, definitions.join(", "))
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name)
    }
}

/// One row of `pragma_table_info`, as persisted.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct ActualColumn {
    pub name: String,
    pub decl_type: String,
    pub not_null: i64,
    /// 1-based position in the primary key, or 0 if not part of it.
    pub pk: i64,
}

pub(crate) const INTROSPECT_SQL: &str =
    r#"SELECT name, type AS decl_type, "notnull" AS not_null, pk FROM pragma_table_info(?1)"#;

/// Whether the persisted columns of a table can be used as-is.
///
/// The comparison goes both ways:
/// - every persisted column the expected schema doesn't know about must be
///   nullable, otherwise inserts (which never mention it) would fail;
/// - every expected column must be persisted with the same type,
///   nullability and primary key membership.
///
/// A table that doesn't exist has no columns, and is never compatible.
pub fn is_compatible(expected: &Table, actual: &[ActualColumn]) -> bool {
    if actual.is_empty() {
        return false;
    }
    let unknown_are_nullable = actual
        .iter()
        .filter(|a| !expected.columns.iter().any(|e| e.name == a.name))
        .all(|a| a.not_null == 0);
    let expected_are_present = expected.columns.iter().all(|e| {
        actual.iter().any(|a| {
            a.name == e.name
                && a.decl_type.eq_ignore_ascii_case(e.kind.as_sql())
                && (a.not_null == 0) == e.nullable
                && (a.pk > 0) == e.primary
        })
    });
    unknown_are_nullable && expected_are_present
}

/// What reconciliation had to do when the cache was opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// `file_shares` was (re)created; `directory_entries` always goes with it.
    pub shares_reset: bool,
    /// `directory_entries` was (re)created.
    pub entries_reset: bool,
}
impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        !self.shares_reset && !self.entries_reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// The columns SQLite would report for a table created by `create_sql`.
    fn persisted(table: &Table) -> Vec<ActualColumn> {
        let mut pk = 0;
        table
            .columns
            .iter()
            .map(|c| ActualColumn {
                name: c.name.to_string(),
                decl_type: c.kind.as_sql().to_string(),
                not_null: i64::from(!c.nullable),
                pk: match c.primary {
                    true => {
                        pk += 1;
                        pk
                    },
                    false => 0,
                },
            })
            .collect()
    }

    #[test]
    fn test_create_sql() {
        assert_eq!(
            DIRECTORY_ENTRIES.create_sql(),
            "CREATE TABLE directory_entries (file_share_id TEXT NOT NULL, data_plane_endpoint TEXT NOT NULL, \
             path TEXT NOT NULL, entry_name TEXT NOT NULL, is_directory INTEGER NOT NULL, \
             PRIMARY KEY (file_share_id, data_plane_endpoint, path))"
        );
        assert!(FILE_SHARES.create_sql().contains("snapshot_time TEXT,"));
    }

    #[rstest]
    #[case(FILE_SHARES)]
    #[case(DIRECTORY_ENTRIES)]
    fn test_exact_schema_is_compatible(#[case] table: Table) {
        assert!(is_compatible(&table, &persisted(&table)));
    }

    #[test]
    fn test_missing_table_is_incompatible() {
        assert!(!is_compatible(&FILE_SHARES, &[]));
    }

    #[test]
    fn test_missing_column_is_incompatible() {
        let mut actual = persisted(&FILE_SHARES);
        actual.retain(|c| c.name != "resource_type");
        assert!(!is_compatible(&FILE_SHARES, &actual));
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let mut actual = persisted(&DIRECTORY_ENTRIES);
        actual[3].decl_type = "text".to_string();
        assert!(is_compatible(&DIRECTORY_ENTRIES, &actual));
    }

    #[rstest]
    #[case::wrong_type(|c: &mut ActualColumn| c.decl_type = "BLOB".to_string())]
    #[case::became_nullable(|c: &mut ActualColumn| c.not_null = 0)]
    #[case::left_primary_key(|c: &mut ActualColumn| c.pk = 0)]
    fn test_changed_key_column_is_incompatible(#[case] change: fn(&mut ActualColumn)) {
        let mut actual = persisted(&DIRECTORY_ENTRIES);
        change(&mut actual[2]);
        assert!(!is_compatible(&DIRECTORY_ENTRIES, &actual));
    }

    #[test]
    fn test_extra_primary_key_column_is_incompatible() {
        let mut actual = persisted(&DIRECTORY_ENTRIES);
        actual[3].pk = 4;
        assert!(!is_compatible(&DIRECTORY_ENTRIES, &actual));
    }

    #[rstest]
    #[case(0, true)]
    #[case(1, false)]
    fn test_unknown_column(#[case] not_null: i64, #[case] compatible: bool) {
        let mut actual = persisted(&FILE_SHARES);
        actual.push(ActualColumn {
            name: "observed_by".to_string(),
            decl_type: "TEXT".to_string(),
            not_null,
            pk: 0,
        });
        assert_eq!(is_compatible(&FILE_SHARES, &actual), compatible);
    }
}
