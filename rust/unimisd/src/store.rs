//! Generic CRUD over the workspace database.
//!
//! Every entity table implements [`Table`]; screens talk to the database only
//! through the [`Store`] trait so their workflows can be exercised against an
//! in-memory database or a wrapping test double.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, error};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {entity}: {message}")]
    UniquenessViolation {
        entity: &'static str,
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    fn classify(entity: &'static str, e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &e {
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return StoreError::UniquenessViolation {
                    entity,
                    message: msg.clone().unwrap_or_else(|| e.to_string()),
                };
            }
        }
        StoreError::Sqlite(e)
    }
}

/// What happens to rows in other tables that point at a row being deleted.
#[derive(Debug, Clone, Copy)]
pub enum OnDelete {
    Cascade {
        table: &'static str,
        column: &'static str,
    },
    Nullify {
        table: &'static str,
        column: &'static str,
    },
}

pub trait Table: Sized {
    /// Human readable entity name, used in messages and logs.
    const ENTITY: &'static str;
    const TABLE: &'static str;
    /// Non-id columns, in the order produced by [`Table::values`] and read by
    /// [`Table::from_row`] (which sees `id` first).
    const COLUMNS: &'static [&'static str];
    const ORDER_BY: &'static str;
    const ON_DELETE: &'static [OnDelete] = &[];

    fn id(&self) -> &str;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn values(&self) -> Vec<Value>;
}

pub trait Store {
    fn find_by_id<T: Table>(&self, id: &str) -> StoreResult<Option<T>>;
    /// All rows in the table's stable display order.
    fn find_all<T: Table>(&self) -> StoreResult<Vec<T>>;
    fn find_children<T: Table>(
        &self,
        parent_column: &'static str,
        parent_id: &str,
    ) -> StoreResult<Vec<T>>;
    fn find_by_column<T: Table>(&self, column: &'static str, value: &str)
        -> StoreResult<Option<T>>;
    fn insert<T: Table>(&self, record: &T) -> StoreResult<String>;
    fn update<T: Table>(&self, record: &T) -> StoreResult<()>;
    fn delete<T: Table>(&self, id: &str) -> StoreResult<()>;
    fn count<T: Table>(&self) -> StoreResult<i64>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn select_sql<T: Table>() -> String {
        format!("SELECT id, {} FROM {}", T::COLUMNS.join(", "), T::TABLE)
    }

    fn query<T: Table>(&self, sql: &str, params: &[&str]) -> StoreResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| T::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Store for SqliteStore<'_> {
    fn find_by_id<T: Table>(&self, id: &str) -> StoreResult<Option<T>> {
        let sql = format!("{} WHERE id = ?", Self::select_sql::<T>());
        Ok(self
            .conn
            .query_row(&sql, [id], |row| T::from_row(row))
            .optional()?)
    }

    fn find_all<T: Table>(&self) -> StoreResult<Vec<T>> {
        let sql = format!("{} ORDER BY {}", Self::select_sql::<T>(), T::ORDER_BY);
        self.query(&sql, &[])
    }

    fn find_children<T: Table>(
        &self,
        parent_column: &'static str,
        parent_id: &str,
    ) -> StoreResult<Vec<T>> {
        let sql = format!(
            "{} WHERE {} = ? ORDER BY {}",
            Self::select_sql::<T>(),
            parent_column,
            T::ORDER_BY
        );
        self.query(&sql, &[parent_id])
    }

    fn find_by_column<T: Table>(
        &self,
        column: &'static str,
        value: &str,
    ) -> StoreResult<Option<T>> {
        let sql = format!(
            "{} WHERE {} = ? ORDER BY {} LIMIT 1",
            Self::select_sql::<T>(),
            column,
            T::ORDER_BY
        );
        Ok(self.query::<T>(&sql, &[value])?.into_iter().next())
    }

    fn insert<T: Table>(&self, record: &T) -> StoreResult<String> {
        let id = if record.id().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            record.id().to_string()
        };
        let placeholders = vec!["?"; T::COLUMNS.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO {}(id, {}) VALUES({})",
            T::TABLE,
            T::COLUMNS.join(", "),
            placeholders
        );
        let mut bind_values = vec![Value::Text(id.clone())];
        bind_values.extend(record.values());

        let tx = self.conn.unchecked_transaction()?;
        if let Err(e) = tx.execute(&sql, params_from_iter(bind_values)) {
            let _ = tx.rollback();
            return Err(StoreError::classify(T::ENTITY, e));
        }
        tx.commit()?;
        debug!(entity = T::ENTITY, %id, "inserted");
        Ok(id)
    }

    fn update<T: Table>(&self, record: &T) -> StoreResult<()> {
        let set_parts: Vec<String> = T::COLUMNS.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            T::TABLE,
            set_parts.join(", ")
        );
        let mut bind_values = record.values();
        bind_values.push(Value::Text(record.id().to_string()));

        let tx = self.conn.unchecked_transaction()?;
        let changed = match tx.execute(&sql, params_from_iter(bind_values)) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return Err(StoreError::classify(T::ENTITY, e));
            }
        };
        if changed == 0 {
            let _ = tx.rollback();
            return Err(StoreError::NotFound {
                entity: T::ENTITY,
                id: record.id().to_string(),
            });
        }
        tx.commit()?;
        debug!(entity = T::ENTITY, id = record.id(), "updated");
        Ok(())
    }

    fn delete<T: Table>(&self, id: &str) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        // No ON DELETE clauses in the schema; dependents are handled here, in order.
        for rule in T::ON_DELETE {
            let sql = match rule {
                OnDelete::Cascade { table, column } => {
                    format!("DELETE FROM {table} WHERE {column} = ?")
                }
                OnDelete::Nullify { table, column } => {
                    format!("UPDATE {table} SET {column} = NULL WHERE {column} = ?")
                }
            };
            if let Err(e) = tx.execute(&sql, [id]) {
                let _ = tx.rollback();
                error!(entity = T::ENTITY, %id, ?rule, "dependent cleanup failed");
                return Err(StoreError::classify(T::ENTITY, e));
            }
        }

        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let changed = match tx.execute(&sql, [id]) {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return Err(StoreError::classify(T::ENTITY, e));
            }
        };
        if changed == 0 {
            let _ = tx.rollback();
            return Err(StoreError::NotFound {
                entity: T::ENTITY,
                id: id.to_string(),
            });
        }
        tx.commit()?;
        debug!(entity = T::ENTITY, %id, "deleted");
        Ok(())
    }

    fn count<T: Table>(&self) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        Ok(self.conn.query_row(&sql, [], |r| r.get(0))?)
    }
}

/// Text column helper: trimmed, with empty strings stored as NULL.
pub fn opt_text(v: &Option<String>) -> Value {
    match v.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Value::Text(s.to_string()),
        _ => Value::Null,
    }
}

pub fn opt_int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}
