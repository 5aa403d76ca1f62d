use std::io::IsTerminal;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::backend::TransferProgress;
use crate::util::format_bytes;

/// Controls how step output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Spinners and bars redrawn in place on stderr.
    Normal,
    /// No ANSI. Plain lines on stdout, for pipes and tests.
    Plain,
}

impl OutputMode {
    pub fn detect() -> Self {
        if std::io::stderr().is_terminal() {
            OutputMode::Normal
        } else {
            OutputMode::Plain
        }
    }
}

/// Numbered steps with spinners, a checkmark on success and a cross on
/// failure.
pub struct StepProgress {
    multi: MultiProgress,
    total_steps: usize,
    current_step: usize,
    mode: OutputMode,
}

/// Handle passed into a step closure.
pub struct Step {
    bar: ProgressBar,
    multi: MultiProgress,
    done_label: Arc<Mutex<Option<String>>>,
    mode: OutputMode,
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn done_style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] \u{2713} {msg:.green}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn failed_style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] \u{2717} {msg:.red}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn transfer_style() -> ProgressStyle {
    ProgressStyle::with_template("      {bar:30.cyan/blue} {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl StepProgress {
    pub fn new(total_steps: usize, mode: OutputMode) -> Self {
        let multi = if mode == OutputMode::Plain {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::stderr())
        };
        Self {
            multi,
            total_steps,
            current_step: 0,
            mode,
        }
    }

    /// Run a fallible async task as a numbered step.
    ///
    /// The outcome decides the final mark. Finalization happens here rather
    /// than in `Step::drop`, so closures that never touch the handle still
    /// get the spinner replaced.
    pub async fn run<F, Fut, T, E>(&mut self, label: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(Step) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.current_step += 1;
        let prefix = format!("{}/{}", self.current_step, self.total_steps);

        if self.mode == OutputMode::Plain {
            println!("[{prefix}] {label}");
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style());
        bar.set_prefix(prefix.clone());
        bar.set_message(label.to_string());
        if self.mode == OutputMode::Normal {
            bar.enable_steady_tick(Duration::from_millis(80));
        }

        let done_label = Arc::new(Mutex::new(None));
        let step = Step {
            bar: bar.clone(),
            multi: self.multi.clone(),
            done_label: done_label.clone(),
            mode: self.mode,
        };

        let result = f(step).await;

        match &result {
            Ok(_) => {
                let done = done_label
                    .lock()
                    .ok()
                    .and_then(|l| l.clone())
                    .unwrap_or_else(|| label.to_string());
                if self.mode == OutputMode::Plain {
                    println!("[{prefix}] \u{2713} {done}");
                }
                bar.set_style(done_style());
                bar.finish_with_message(done);
            }
            Err(e) => {
                if self.mode == OutputMode::Plain {
                    println!("[{prefix}] \u{2717} {label}: {e}");
                }
                bar.set_style(failed_style());
                bar.finish_with_message(format!("{label}: {e}"));
            }
        }

        result
    }

    /// Print a plain line above the managed area.
    pub fn println(&self, text: &str) {
        if self.mode == OutputMode::Plain {
            println!("{text}");
        } else {
            self.multi.println(text).ok();
        }
    }
}

impl Step {
    /// Override the completion label shown with the checkmark.
    pub fn set_done_label(&self, label: impl Into<String>) {
        if let Ok(mut l) = self.done_label.lock() {
            *l = Some(label.into());
        }
    }

    /// Replace the spinner message while the step runs.
    pub fn log(&self, line: &str) {
        if self.mode == OutputMode::Plain {
            println!("        {line}");
        } else {
            self.bar.set_message(line.to_string());
        }
    }

    /// Add a transfer bar below this step.
    pub fn transfer(&self) -> TransferBar {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(transfer_style());
        TransferBar {
            bar,
            mode: self.mode,
            last_reported: None,
        }
    }
}

/// Byte transfer bar fed by [`TransferProgress`] reports.
pub struct TransferBar {
    bar: ProgressBar,
    mode: OutputMode,
    last_reported: Option<u8>,
}

impl TransferBar {
    pub fn update(&mut self, progress: &TransferProgress) {
        self.bar.set_position(u64::from(progress.percent.min(100)));
        self.bar.set_message(transfer_message(progress));

        // Plain output reports every tenth percent once.
        let decile = progress.percent / 10;
        if self.mode == OutputMode::Plain && self.last_reported != Some(decile) {
            self.last_reported = Some(decile);
            println!("        {:>3}% {}", progress.percent, transfer_message(progress));
        }
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

fn transfer_message(p: &TransferProgress) -> String {
    let mut parts = Vec::new();
    if p.total_bytes > 0 {
        parts.push(format!(
            "{} / {}",
            format_bytes(p.downloaded_bytes),
            format_bytes(p.total_bytes)
        ));
    }
    if !p.speed.is_empty() {
        parts.push(format!("{}/s", p.speed));
    }
    if !p.eta.is_empty() {
        parts.push(format!("eta {}", p.eta));
    }
    parts.join("  ")
}
