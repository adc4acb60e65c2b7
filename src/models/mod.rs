pub mod post;
pub mod user;

use mongodb::bson::DateTime;

/// BSON datetimes are rendered as RFC 3339 strings on the wire.
pub(crate) fn format_date(date: DateTime) -> String {
    date.try_to_rfc3339_string().unwrap_or_default()
}
