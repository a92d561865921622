//! Terminal output utilities

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use shipami_core::ImageState;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Image state colored by outcome
pub fn state(state: ImageState) -> String {
    let label = format!("[{}]", state);
    match state {
        ImageState::Available => label.green().to_string(),
        ImageState::Pending => label.yellow().to_string(),
        ImageState::Failed => label.red().to_string(),
        _ => label.dimmed().to_string(),
    }
}

/// Create a spinner
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
