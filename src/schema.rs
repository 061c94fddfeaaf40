//! Schema locking and cross-batch validation

use crate::batch_reader::Batch;
use crate::error::{ConvertError, Result};
use crate::types::ColumnType;
use arrow::datatypes::{Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One named, typed column of a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub name: &'a str,
    pub column_type: ColumnType,
}

/// Ordered, name-unique list of columns and their types
///
/// A schema resolved from a batch never contains [`ColumnType::Null`];
/// null-only columns are stored as [`ColumnType::Float64`], which later
/// integer or float batches fit into.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Schema {
    columns: IndexMap<String, ColumnType>,
}

impl Schema {
    /// Build a schema from `(name, type)` pairs
    ///
    /// Fails with [`ConvertError::Resource`] on a repeated column name.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        let mut map = IndexMap::new();
        for (name, ty) in columns {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(ConvertError::Resource(format!(
                    "duplicate column '{}' in schema",
                    name
                )));
            }
            map.insert(name, ty);
        }
        Ok(Self { columns: map })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in order
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> + '_ {
        self.columns.iter().map(|(name, ty)| Field {
            name,
            column_type: *ty,
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Type of a column by name
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).copied()
    }

    /// Type of a column by position
    pub fn type_at(&self, idx: usize) -> Option<ColumnType> {
        self.columns.get_index(idx).map(|(_, ty)| *ty)
    }

    /// Arrow schema used to write Parquet; every column is nullable
    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<ArrowField> = self
            .columns
            .iter()
            .map(|(name, ty)| ArrowField::new(name, ty.to_arrow(), true))
            .collect();
        Arc::new(ArrowSchema::new(fields))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, (name, ty)) in self.columns.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        write!(f, ")")
    }
}

/// Derives a run's schema from its first batch and checks every later batch against it
///
/// # Examples
///
/// ```no_run
/// use parquetstream::{BatchReader, SchemaResolver};
///
/// let mut reader = BatchReader::open("data.csv", 1_000)?;
/// let first = reader.next_batch()?.expect("at least one row");
/// let schema = SchemaResolver::resolve(&first)?;
///
/// for batch in reader {
///     SchemaResolver::validate(&batch?, &schema)?;
/// }
/// # Ok::<(), parquetstream::ConvertError>(())
/// ```
pub struct SchemaResolver;

impl SchemaResolver {
    /// Lock a schema from the first batch of a run
    ///
    /// Columns with no values yet become `Float64`, so a run that starts with
    /// missing numbers resolves to the same schema at any batch size.
    pub fn resolve(batch: &Batch) -> Result<Schema> {
        Schema::new(batch.columns().iter().zip(batch.types()).map(|(name, ty)| {
            let ty = match ty {
                ColumnType::Null => ColumnType::Float64,
                other => *other,
            };
            (name.clone(), ty)
        }))
    }

    /// Check that `batch` can be written under `schema`
    ///
    /// Column count, order and names must match exactly. Each column's
    /// inferred type must equal the locked type or promote to it losslessly.
    pub fn validate(batch: &Batch, schema: &Schema) -> Result<()> {
        let mut locked = schema.fields();
        for (name, &found) in batch.columns().iter().zip(batch.types()) {
            let Some(field) = locked.next() else {
                return Err(ConvertError::SchemaMismatch {
                    column: name.clone(),
                    expected: ColumnType::Null,
                    found,
                });
            };
            if field.name != name.as_str() {
                return Err(ConvertError::SchemaMismatch {
                    column: name.clone(),
                    expected: field.column_type,
                    found,
                });
            }
            if !found.promotes_to(field.column_type) {
                return Err(ConvertError::SchemaMismatch {
                    column: name.clone(),
                    expected: field.column_type,
                    found,
                });
            }
        }

        if let Some(missing) = locked.next() {
            return Err(ConvertError::SchemaMismatch {
                column: missing.name.to_string(),
                expected: missing.column_type,
                found: ColumnType::Null,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn batch(columns: &[&str], rows: Vec<Vec<Value>>) -> Batch {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        Batch::from_rows(columns, rows).unwrap()
    }

    #[test]
    fn test_resolve_locks_null_as_float() -> Result<()> {
        let first = batch(
            &["id", "score"],
            vec![vec![Value::Int(1), Value::Null]],
        );
        let schema = SchemaResolver::resolve(&first)?;
        assert_eq!(schema.column_type("id"), Some(ColumnType::Int64));
        assert_eq!(schema.column_type("score"), Some(ColumnType::Float64));
        assert_eq!(schema.to_string(), "(id: Int64, score: Float64)");

        // Later numeric batches fit the locked column
        let ints = batch(&["id", "score"], vec![vec![Value::Int(2), Value::Int(7)]]);
        SchemaResolver::validate(&ints, &schema)?;
        let floats = batch(&["id", "score"], vec![vec![Value::Int(3), Value::Float(3.5)]]);
        SchemaResolver::validate(&floats, &schema)
    }

    #[test]
    fn test_validate_allows_promotion() -> Result<()> {
        let schema = Schema::new([("x", ColumnType::Float64), ("y", ColumnType::Boolean)])?;
        let later = batch(&["x", "y"], vec![vec![Value::Int(3), Value::Null]]);
        SchemaResolver::validate(&later, &schema)
    }

    #[test]
    fn test_validate_rejects_text_for_int() {
        let schema = Schema::new([("name", ColumnType::Utf8), ("age", ColumnType::Int64)]).unwrap();
        let later = batch(
            &["name", "age"],
            vec![vec![Value::from("a"), Value::from("old")]],
        );
        match SchemaResolver::validate(&later, &schema) {
            Err(ConvertError::SchemaMismatch {
                column,
                expected,
                found,
            }) => {
                assert_eq!(column, "age");
                assert_eq!(expected, ColumnType::Int64);
                assert_eq!(found, ColumnType::Utf8);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_float_for_int() {
        let schema = Schema::new([("v", ColumnType::Int64)]).unwrap();
        let later = batch(&["v"], vec![vec![Value::Float(1.5)]]);
        assert!(SchemaResolver::validate(&later, &schema).is_err());
    }

    #[test]
    fn test_validate_column_layout() {
        let schema = Schema::new([("a", ColumnType::Int64), ("b", ColumnType::Int64)]).unwrap();

        let reordered = batch(&["b", "a"], vec![vec![Value::Int(1), Value::Int(2)]]);
        let err = SchemaResolver::validate(&reordered, &schema).unwrap_err();
        assert!(matches!(err, ConvertError::SchemaMismatch { ref column, .. } if column == "b"));

        let narrower = batch(&["a"], vec![vec![Value::Int(1)]]);
        let err = SchemaResolver::validate(&narrower, &schema).unwrap_err();
        assert!(matches!(err, ConvertError::SchemaMismatch { ref column, .. } if column == "b"));

        let wider = batch(
            &["a", "b", "c"],
            vec![vec![Value::Int(1), Value::Int(2), Value::Int(3)]],
        );
        let err = SchemaResolver::validate(&wider, &schema).unwrap_err();
        assert!(matches!(err, ConvertError::SchemaMismatch { ref column, .. } if column == "c"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(Schema::new([("a", ColumnType::Int64), ("a", ColumnType::Utf8)]).is_err());
    }

    #[test]
    fn test_to_arrow() -> Result<()> {
        let schema = Schema::new([("a", ColumnType::Boolean)])?;
        let arrow = schema.to_arrow();
        assert_eq!(arrow.field(0).name(), "a");
        assert_eq!(arrow.field(0).data_type(), &arrow::datatypes::DataType::Boolean);
        assert!(arrow.field(0).is_nullable());
        Ok(())
    }
}
