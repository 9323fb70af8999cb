//! `rani tasks` - show queued scripts without running them

use colored::Colorize;
use declarative::{Task, queue};

use crate::app::App;
use crate::ui;

/// Queued tasks in run order, each followed by a rule
pub fn render_scripts(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        let level = if task.requires_privilege {
            "escalated"
        } else {
            "normal"
        };
        out.push_str(&format!(
            "{} {} [{}] (priority {})\n",
            task.icon,
            task.display_name.bold(),
            level,
            task.priority
        ));
        out.push_str(task.script.trim_end());
        out.push('\n');
        out.push_str(&ui::rule().dimmed().to_string());
        out.push('\n');
    }
    out
}

pub fn run(app: &App) {
    let tasks = queue::lock(&app.queue).sorted();
    ui::header("Queued Tasks");
    if tasks.is_empty() {
        ui::success("Nothing queued");
        return;
    }
    println!();
    print!("{}", render_scripts(&tasks));
}
