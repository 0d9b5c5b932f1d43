use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use clientstrap_core::{InstallProgress, ProgressState};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing::info;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

impl OutputStyle {
    pub fn current() -> Self {
        resolve_output_style(
            std::io::stderr().is_terminal(),
            std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty()),
        )
    }
}

/// Runner logs are not terminals, so CI output stays plain.
pub fn resolve_output_style(stderr_is_tty: bool, no_color: bool) -> OutputStyle {
    if stderr_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// Reports install progress: a bar on an interactive terminal, one log line
/// per poll otherwise.
pub struct ProgressReporter {
    style: OutputStyle,
    label: String,
    percent: f32,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl ProgressReporter {
    pub fn start(label: &str) -> Self {
        Self::with_style(OutputStyle::current(), label)
    }

    pub fn with_style(style: OutputStyle, label: &str) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(100);
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {prefix:<14} [{bar:20.cyan/blue}] {pos:>3}% {msg} {elapsed_precise}",
            ) {
                progress_bar.set_style(template.tick_chars("|/-\\ ").progress_chars("=>-"));
            }
            progress_bar.set_prefix(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        Self {
            style,
            label: label.to_string(),
            percent: 0.0,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub fn update(&mut self, progress: &InstallProgress) {
        self.percent = progress.percent;
        match &self.progress_bar {
            Some(progress_bar) => {
                progress_bar.set_position(progress.percent.round() as u64);
                progress_bar.set_message(render_transfer(progress));
            }
            None => info!("{}", describe_progress(&self.label, progress)),
        }
    }

    pub fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.percent,
            Some(self.started_at.elapsed()),
        ) {
            eprintln!("{line}");
        }
    }

    pub fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.abandon();
        }
    }
}

pub fn describe_progress(label: &str, progress: &InstallProgress) -> String {
    match (progress.state, progress.bytes) {
        (ProgressState::Unknown, _) => {
            format!("{label}: waiting for progress ({})", progress.raw)
        }
        (_, Some(_)) => format!(
            "{label} updating: {:.0}% {}",
            progress.percent,
            render_transfer(progress)
        ),
        (_, None) => format!("Installing {label}... {:.0}%", progress.percent),
    }
}

fn render_transfer(progress: &InstallProgress) -> String {
    progress
        .bytes
        .map(|bytes| {
            format!(
                "({} left, {:.2} MB/s)",
                HumanBytes(bytes.remaining()),
                bytes.megabytes_per_second()
            )
        })
        .unwrap_or_default()
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub fn render_progress_line(
    style: OutputStyle,
    label: &str,
    percent: f32,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let bounded = percent.clamp(0.0, 100.0);
    let filled = ((bounded / 100.0) * width as f32) as usize;
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3.0}%{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        bounded,
        suffix
    ))
}
