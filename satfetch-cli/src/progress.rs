//! Terminal progress bars for batch downloads.

use std::sync::Arc;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use satfetch::download::{BatchProgress, ProgressSinks, ReturnCode};

/// File bars count in permille.
const FILE_STEPS: u64 = 1000;

/// Progress sinks drawing one bar for the batch and one for the current file.
pub fn progress_sinks(total: usize) -> ProgressSinks {
    let multi = MultiProgress::new();

    let batch = multi.add(ProgressBar::new(total as u64));
    batch.set_style(
        ProgressStyle::with_template("{prefix:>9} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    batch.set_prefix("Products");

    let file = multi.add(ProgressBar::new(FILE_STEPS));
    file.set_style(
        ProgressStyle::with_template("{prefix:>9} [{bar:40.yellow/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    file.set_prefix("File");

    let file_bar = file.clone();
    let batch_bar = batch.clone();

    ProgressSinks::new()
        .with_file(Arc::new(move |fraction: f64, mb_per_sec: f64| {
            file_bar.set_position((fraction.clamp(0.0, 1.0) * FILE_STEPS as f64) as u64);
            file_bar.set_message(format!("{:.2} MB/s", mb_per_sec));
        }))
        .with_batch(Arc::new(move |update: &BatchProgress| {
            batch_bar.set_position(update.completed as u64);
            batch_bar.println(outcome_line(update));
            if update.completed >= update.total {
                batch_bar.finish_with_message("done");
                file.finish_and_clear();
            }
        }))
}

fn outcome_line(update: &BatchProgress) -> String {
    let code = match update.code {
        ReturnCode::Ok => style(update.code.as_str()).green(),
        ReturnCode::EmptyProduct => style(update.code.as_str()).yellow(),
        ReturnCode::DownloadError | ReturnCode::Fatal => style(update.code.as_str()).red(),
    };
    format!(
        "{} {} ({:.2} MB/s)",
        code, update.product, update.average_speed
    )
}
