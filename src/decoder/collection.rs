//! Materializing result sets into vectors of records.

use super::{ensure_record, Decoder};
use crate::error::{FieldMismatches, Result, WmiError};
use crate::object::ResultSet;
use serde::de::DeserializeOwned;

/// Upper bound on how much of a reported count is reserved up front.
const MAX_PREALLOCATED: usize = 64 * 1024;

impl Decoder {
    /// Decode every element of a result set into `dst`.
    ///
    /// `dst` is replaced. `T` may be a record or a boxed record. Elements that
    /// fail with a field mismatch are left out and their mismatches are
    /// returned together as [`WmiError::FieldMismatches`] once the whole set
    /// has been read. Any other failure stops at once and leaves `dst` empty.
    pub fn decode_all<T: DeserializeOwned>(
        &self,
        results: &mut dyn ResultSet,
        dst: &mut Vec<T>,
    ) -> Result<()> {
        ensure_record::<T>()?;
        dst.clear();

        let count = results.count()?;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOCATED));
        let mut mismatches = Vec::new();

        while let Some(object) = results.next_object()? {
            match self.decode::<T>(&*object) {
                Ok(item) => items.push(item),
                Err(WmiError::FieldMismatch(mismatch)) => {
                    tracing::warn!(
                        property = %mismatch.property,
                        reason = %mismatch.reason,
                        "Skipping element with mismatched field"
                    );
                    mismatches.push(mismatch);
                }
                Err(WmiError::FieldMismatches(list)) => mismatches.extend(list.0),
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(
            reported = count,
            decoded = items.len(),
            mismatched = mismatches.len(),
            "Materialized result set"
        );

        *dst = items;
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(WmiError::FieldMismatches(FieldMismatches(mismatches)))
        }
    }
}
