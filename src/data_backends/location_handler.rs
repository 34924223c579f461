use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

/// Creates a unique object key for a file: `YYYY/MM/DD/<uuid>[.<ext>]`
pub fn create_file_key(file_name: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}", create_date_dir(now), create_uuid_filename(file_name))
}

pub fn create_date_dir(now: DateTime<Utc>) -> String {
    format!("{}/{:02}/{:02}", now.year(), now.month(), now.day())
}

pub fn create_uuid_filename(file_name: &str) -> String {
    match extension(file_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Everything after the last dot of the final path segment
pub fn extension(file_name: &str) -> Option<&str> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext),
        _ => None,
    }
}
