use std::error::Error;
use std::hash::{Hash, Hasher};

use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

/// A single typed column value.
///
/// Covers the column types the loader moves between staging and warehouse tables.
/// Values bind directly as statement parameters via [`ToSql`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 16-bit integer.
    I16(i16),
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Text value.
    String(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Timestamp without timezone.
    Timestamp(NaiveDateTime),
    /// Array of text values, used by the metadata column lists.
    TextArray(Vec<String>),
}

// Natural-key columns never carry NaN, so treating float cells as totally
// equatable is sound for key matching.
impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Null => {}
            Cell::Bool(v) => v.hash(state),
            Cell::I16(v) => v.hash(state),
            Cell::I32(v) => v.hash(state),
            Cell::I64(v) => v.hash(state),
            Cell::F32(v) => v.to_bits().hash(state),
            Cell::F64(v) => v.to_bits().hash(state),
            Cell::String(v) => v.hash(state),
            Cell::Date(v) => v.hash(state),
            Cell::Timestamp(v) => v.hash(state),
            Cell::TextArray(v) => v.hash(state),
        }
    }
}

impl ToSql for Cell {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Cell::Null => Ok(IsNull::Yes),
            Cell::Bool(v) => v.to_sql(ty, out),
            Cell::I16(v) => v.to_sql(ty, out),
            Cell::I32(v) => v.to_sql(ty, out),
            Cell::I64(v) => v.to_sql(ty, out),
            Cell::F32(v) => v.to_sql(ty, out),
            Cell::F64(v) => v.to_sql(ty, out),
            Cell::String(v) => v.to_sql(ty, out),
            Cell::Date(v) => v.to_sql(ty, out),
            Cell::Timestamp(v) => v.to_sql(ty, out),
            Cell::TextArray(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Type agreement is delegated to the inner value at bind time.
        true
    }

    to_sql_checked!();
}
