use crate::domain::{DomainError, DomainResult};
use garde::{Report, Validate};
use tracing::debug;

/// Run garde rules on `value`, folding every failure into one
/// `DomainError::ValidationError`
pub fn validate_struct<T>(value: &T) -> DomainResult<()>
where
    T: Validate,
    T::Context: Default,
{
    value.validate().map_err(|report| {
        let message = describe_failures(&report);
        debug!(failures = %message, "validation failed");
        DomainError::ValidationError(message)
    })
}

/// `path: message` per failing field, comma separated. Struct-level
/// failures have an empty path and are listed by message alone.
fn describe_failures(report: &Report) -> String {
    let mut failures = Vec::new();
    for (path, error) in report.iter() {
        let path = path.to_string();
        if path.is_empty() {
            failures.push(error.message().to_string());
        } else {
            failures.push(format!("{path}: {}", error.message()));
        }
    }
    failures.join(", ")
}
