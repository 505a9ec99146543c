// src/export.rs
//! CSV export of the visitor list for the admin dashboard.

use crate::models::chat::Visitor;
use chrono::NaiveDate;

pub const EXPORT_LIMIT: i64 = 10_000;

const BOM: &str = "\u{feff}";
const HEADER: [&str; 6] = ["ID", "Name", "Email", "Phone", "Created At", "Updated At"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn export_filename(date: NaiveDate) -> String {
    format!("chat-users-{}.csv", date.format("%Y-%m-%d"))
}

/// Renders visitors as UTF-8 CSV with a byte-order mark so spreadsheet apps
/// pick the right encoding.
pub fn visitors_csv(visitors: &[Visitor]) -> String {
    let mut out = String::from(BOM);
    write_row(&mut out, HEADER.iter().copied());

    for visitor in visitors {
        let id = visitor.id.to_string();
        let created = visitor.created_at.format(TIMESTAMP_FORMAT).to_string();
        let updated = visitor.updated_at.format(TIMESTAMP_FORMAT).to_string();
        write_row(
            &mut out,
            [
                id.as_str(),
                visitor.name.as_str(),
                visitor.email.as_deref().unwrap_or(""),
                visitor.phone.as_deref().unwrap_or(""),
                created.as_str(),
                updated.as_str(),
            ],
        );
    }

    out
}

fn write_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
