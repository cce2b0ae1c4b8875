use std::io::IsTerminal;

use nu_ansi_term::{Color, Style};
use salvage::diagnose::{DiagnoseSummary, Outcome, StepRecord, StepStatus};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    Auto,
    Light,
    Dark,
    Plain,
}

/// Post-run status block printed after the report has been written.
pub struct Ui {
    palette: Palette,
}

impl Ui {
    pub fn new(theme: Theme) -> Self {
        let paint = theme != Theme::Plain && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let palette = match (paint, theme) {
            (false, _) | (_, Theme::Plain) => Palette::default(),
            (true, Theme::Light) => Palette::light(),
            (true, Theme::Dark | Theme::Auto) => Palette::dark(),
        };
        Self { palette }
    }

    /// One line per step that ran, with its status and any reason.
    pub fn steps(&self, records: &[StepRecord]) {
        self.heading("Steps");
        for record in records {
            let name = format!("{:<10}", step_label(record));
            match &record.status {
                StepStatus::Completed => {
                    println!("  {} {}", self.palette.done.paint("done"), name);
                }
                StepStatus::Skipped { reason } => {
                    println!("  {} {}{reason}", self.palette.skipped.paint("skip"), name);
                }
                StepStatus::Failed { message } => {
                    println!("  {} {}{message}", self.palette.failed.paint("FAIL"), name);
                }
            }
        }
    }

    /// Where everything the run produced ended up.
    pub fn artifacts(&self, summary: &DiagnoseSummary) {
        self.heading("Artifacts");
        println!("  report  {}", summary.report.display());
        if let Some(backup) = &summary.backup {
            println!("  backup  {} ({} bytes)", backup.path.display(), backup.bytes);
        }
        if let Some(dump) = &summary.dump {
            println!(
                "  dump    {} ({} statements)",
                dump.path.display(),
                dump.statements
            );
        }
        for path in summary.exported_files() {
            println!("  csv     {}", path.display());
        }
    }

    pub fn outcome(&self, outcome: Outcome) {
        let (style, text) = match outcome {
            Outcome::Healthy => (self.palette.done, "Integrity confirmed and dump written."),
            Outcome::NeedsAttention => (
                self.palette.failed,
                "Needs attention: keep the backup and read the report before repairing.",
            ),
            Outcome::DatabaseMissing => (
                self.palette.skipped,
                "Database file not found; nothing was changed.",
            ),
            Outcome::ConnectionFailed => (
                self.palette.failed,
                "Database could not be opened; see the report.",
            ),
        };
        println!();
        println!("{}", style.paint(text));
    }

    fn heading(&self, title: &str) {
        println!();
        println!("{}", self.palette.heading.paint(title));
    }
}

fn step_label(record: &StepRecord) -> String {
    format!("{:?}", record.step).to_lowercase()
}

#[derive(Default)]
struct Palette {
    heading: Style,
    done: Style,
    skipped: Style,
    failed: Style,
}

impl Palette {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::LightBlue).bold(),
            done: Style::new().fg(Color::LightGreen).bold(),
            skipped: Style::new().fg(Color::Yellow),
            failed: Style::new().fg(Color::LightRed).bold(),
        }
    }

    fn light() -> Self {
        Self {
            heading: Style::new().fg(Color::Blue).bold(),
            done: Style::new().fg(Color::Green).bold(),
            skipped: Style::new().fg(Color::Purple),
            failed: Style::new().fg(Color::Red).bold(),
        }
    }
}
