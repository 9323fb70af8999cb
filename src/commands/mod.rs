pub mod apply;
pub mod status;
pub mod tasks;
pub mod toggle;

use anyhow::Result;
use colored::Colorize;
use declarative::queue;

use crate::Context;
use crate::app::App;
use crate::progress;
use crate::ui;

/// Load config and overrides and scan the system behind a spinner
pub async fn load(ctx: &Context) -> Result<App> {
    let pb = (!ctx.quiet).then(|| progress::spinner("Scanning system..."));
    let result = App::bootstrap().await;
    if let Some(pb) = &pb {
        match &result {
            Ok(_) => progress::finish_success(pb, "System scanned"),
            Err(_) => progress::finish_error(pb, "Scan failed"),
        }
    }
    result
}

/// One line about what is queued
pub fn print_queue_summary(app: &App) {
    let count = queue::lock(&app.queue).count();
    if count == 0 {
        ui::dim("No tasks queued");
    } else {
        ui::dim(&format!(
            "{count} task(s) queued, {} to review, {} to run",
            "rani tasks".bold(),
            "rani apply".bold()
        ));
    }
}
