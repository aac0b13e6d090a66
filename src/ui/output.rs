use crate::ui::theme::{err_theme, theme};
use crate::ui::Icons;
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().heading.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().passed.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(err_theme().failed.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(err_theme().caution.clone()));
}

pub fn info(label: &str, value: &str) {
    println!("{} {}: {}", Icons::INFO, label.style(theme().label.clone()), value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().heading.clone()));
}

/// One line of a load plan: position, dataset, what it references
pub fn plan_step(position: usize, dataset: &str, references: &[String]) {
    let after = if references.is_empty() {
        String::new()
    } else {
        format!(" {} {}", Icons::LINK, references.join(", ").style(theme().reference.clone()))
    };
    println!(
        "{:>3}. {} {}{}",
        position,
        Icons::PACKAGE,
        dataset.style(theme().dataset.clone()),
        after
    );
}

pub fn row_cleared(dataset: &str, row: &str) {
    let cleared = format!("{}.{}", dataset, row);
    println!("{} {}", Icons::DEL, cleared.style(theme().cleared.clone()));
}
