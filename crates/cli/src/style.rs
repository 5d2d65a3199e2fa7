//! Terminal styling for `ldapdir` output.

use console::Style;

use ldapdir_core::models::SectionResult;

fn marked(mark: &str, style: Style, msg: &str) -> String {
    format!("{} {}", style.apply_to(mark), msg)
}

pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

pub fn error(msg: &str) -> String {
    marked("✗", Style::new().red(), msg)
}

pub fn warn(msg: &str) -> String {
    marked("!", Style::new().yellow(), msg)
}

/// Bold heading line.
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Status column for the sections table. Errors take precedence over the
/// hidden flag.
pub fn section_status(section: &SectionResult) -> String {
    if section.error {
        Style::new().red().bold().apply_to("LDAP error").to_string()
    } else if section.exclude_from_directory {
        dim("hidden")
    } else {
        Style::new().green().apply_to("ok").to_string()
    }
}
