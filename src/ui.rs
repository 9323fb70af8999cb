use colored::Colorize;

/// Width of the rule printed between task scripts
pub const RULE_WIDTH: usize = 75;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

/// The separator between printed scripts
pub fn rule() -> String {
    "_".repeat(RULE_WIDTH)
}

/// Marker for an effective on/off value, flagging pending overrides
pub fn toggle_marker(enabled: bool, pending: bool) -> String {
    let mark = if enabled {
        "●".green().to_string()
    } else {
        "○".dimmed().to_string()
    };
    if pending {
        format!("{mark} {}", "*".yellow().bold())
    } else {
        format!("{mark}  ")
    }
}

/// Confirm with user
pub fn confirm_proceed(prompt: &str) -> anyhow::Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new().with_prompt(prompt).default(true).interact()?;

    Ok(confirmed)
}
