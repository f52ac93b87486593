use crate::error::Diagnostic;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn banner(title: &str, subtitle: &str) {
    println!();
    println!("  {}", title);
    println!("  {}", subtitle.style(theme().dim.clone()));
    println!();
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

/// Print a failed compilation, position first
pub fn diagnostic(diagnostic: &Diagnostic) {
    error(&diagnostic.message);
    if let (Some(file), Some(line), Some(column)) = (&diagnostic.file, diagnostic.line, diagnostic.column) {
        eprintln!("   {} {}", "-->".style(theme().muted.clone()), format!("{}:{}:{}", file, line, column));
    }
}

/// One node of a schema tree listing
pub fn tree_line(depth: usize, keyword: &str, identifier: &str, note: &str) {
    let indent = "  ".repeat(depth);
    if note.is_empty() {
        println!(
            "{}{} {}",
            indent,
            keyword.style(theme().keyword.clone()),
            identifier.style(theme().identifier.clone())
        );
    } else {
        println!(
            "{}{} {} {}",
            indent,
            keyword.style(theme().keyword.clone()),
            identifier.style(theme().identifier.clone()),
            note.style(theme().muted.clone())
        );
    }
}

pub fn phase(name: &str) {
    println!();
    println!(
        "{} {}",
        Icons::GEAR.style(theme().info.clone()),
        name.style(theme().header.clone())
    );
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
