//! Row decoding shared by the repository implementations.

use heapless::String as HeaplessString;
use sqlx::{postgres::PgRow, Row};
use std::error::Error;
use std::str::FromStr;

/// Builds a model from one result row.
pub trait TryFromRow<R>: Sized {
    fn try_from_row(row: &R) -> Result<Self, Box<dyn Error + Send + Sync>>;
}

/// Reads a text column into a fixed-capacity string. Fails when the stored
/// value exceeds the model's bound.
pub fn get_heapless_string<const N: usize>(
    row: &PgRow,
    column: &str,
) -> Result<HeaplessString<N>, Box<dyn Error + Send + Sync>> {
    let value: String = row.try_get(column)?;
    bounded(column, &value)
}

/// Nullable variant of [`get_heapless_string`].
pub fn get_optional_heapless_string<const N: usize>(
    row: &PgRow,
    column: &str,
) -> Result<Option<HeaplessString<N>>, Box<dyn Error + Send + Sync>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(|value| bounded(column, value)).transpose()
}

fn bounded<const N: usize>(column: &str, value: &str) -> Result<HeaplessString<N>, Box<dyn Error + Send + Sync>> {
    HeaplessString::from_str(value).map_err(|_| {
        format!("Column {column} holds {} bytes, over its limit of {N}", value.len()).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_rejects_oversized_values() {
        let ean: HeaplessString<18> = bounded("ean", "541448820000000001").unwrap();
        assert_eq!(ean.as_str(), "541448820000000001");

        let error = bounded::<4>("name", "Street A").unwrap_err();
        assert_eq!(error.to_string(), "Column name holds 8 bytes, over its limit of 4");
    }
}
