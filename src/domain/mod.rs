//! Records managed per tenant and the rules their fields must satisfy.

pub mod book;
pub mod collection;
pub mod validation;

pub use book::{Book, BookPatch, BookStatus, NewBook};
pub use collection::{Collection, CollectionPatch, NewCollection};
pub use validation::FieldError;

use chrono::{DateTime, Duration, Utc};

/// Next `updatedAt` for a record last touched at `previous`.
///
/// Strictly greater than `previous` even when the clock has not advanced.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
