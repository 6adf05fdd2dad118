//! Part metadata read from string attributes

use dxport_kernel::{CadSession, PartId};

use crate::config::AttributeKeys;

/// Whether an attribute value is effectively blank.
///
/// Operators fill "not applicable" fields with `X` placeholders, so values
/// made only of spaces and `X`/`x` count as blank too.
pub fn is_blank(value: &str) -> bool {
    value.chars().all(|c| matches!(c, ' ' | 'X' | 'x'))
}

/// Metadata of one part; blank values are `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartMetadata {
    pub job_number: Option<String>,
    pub mark: Option<String>,
    pub drawing_number: Option<String>,
}

impl PartMetadata {
    /// Read metadata attributes of an open part
    pub fn read<S: CadSession + ?Sized>(session: &S, part: PartId, keys: &AttributeKeys) -> Self {
        let read = |key: &str| {
            session
                .string_attribute(part, key)
                .filter(|value| !is_blank(value))
        };

        Self {
            job_number: read(&keys.job),
            mark: read(&keys.mark),
            drawing_number: read(&keys.drawing),
        }
    }

    /// `{job}_{mark}`, or `None` when either is blank
    pub fn canonical_base(&self) -> Option<String> {
        match (&self.job_number, &self.mark) {
            (Some(job), Some(mark)) => Some(format!("{}_{}", job, mark)),
            _ => None,
        }
    }
}
