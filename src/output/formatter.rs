//! Output formatters for run results
//!
//! Console and JSON renderings of a finished run.

use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticTranslator;
use crate::models::{replay, ExecutionResult, OutcomeKind, TestOutcome};
use crate::results::RunSummary;
use crate::utils::Style;

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Some(OutputFormat::Console),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
    max_lines: usize,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
            max_lines: crate::diagnostics::DEFAULT_CONTEXT_LINES,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Source lines shown around a failing line
    pub fn max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    fn style(&self) -> Style {
        Style::new(self.colorize)
    }

    fn translator(&self) -> DiagnosticTranslator {
        let translator = DiagnosticTranslator::new().max_lines(self.max_lines);
        if self.colorize {
            translator
        } else {
            translator.no_color()
        }
    }

    /// Print a finished run to stdout.
    ///
    /// Console output replays each unit's captured logs after its block;
    /// JSON output carries the logs inside the document instead.
    pub fn print_run(&self, summary: &RunSummary) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", self.format_json(summary)?),
            OutputFormat::Console => {
                let translator = self.translator();
                for result in &summary.units {
                    print!("{}", self.format_unit(result, &translator));
                    replay(&result.logs);
                }
                println!("{}", self.format_summary(summary));
            }
        }
        Ok(())
    }

    pub fn format_json(&self, summary: &RunSummary) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }

    /// Header, outcome lines and translated errors for one unit
    pub fn format_unit(&self, result: &ExecutionResult, translator: &DiagnosticTranslator) -> String {
        let style = self.style();
        let path = result.unit.as_str();
        let map = result.source_map.as_deref();
        let mut output = String::new();

        let counts = match &result.report {
            Some(report) => format!(" [{}/{}]", report.stats.passed, report.stats.total),
            None => String::new(),
        };
        output.push_str(&format!(
            "{} {} {} ({:.2}s){}\n",
            style.paint(result.status.color(), result.status.symbol()),
            style.bold(result.description()),
            style.gray(path),
            result.duration,
            counts
        ));

        if let Some(report) = &result.report {
            for outcome in &report.outcomes {
                output.push_str(&self.format_outcome(outcome));

                if let (true, Some(error)) = (outcome.status.is_failure(), &outcome.error) {
                    let text = translator.translate_error(
                        &error.message,
                        error.stack.as_deref(),
                        Some(path),
                        map,
                    );
                    output.push_str(&indent(&text, "    "));
                }
            }
        }

        if let Some(fault) = &result.fault {
            output.push_str(&indent(&translator.translate(fault, Some(path), map), "  "));
        }

        output
    }

    fn format_outcome(&self, outcome: &TestOutcome) -> String {
        let style = self.style();
        let mut line = format!(
            "  {} ",
            style.paint(outcome.status.color(), outcome.status.symbol())
        );

        if outcome.kind == OutcomeKind::Hook {
            line.push_str(&style.dim("[hook] "));
        }
        line.push_str(&outcome.description);

        if outcome.retries > 0 {
            line.push_str(&style.yellow(format!(" (retried {}x)", outcome.retries)));
        }
        if let Some(bench) = &outcome.bench {
            let mut metrics = Vec::new();
            if let Some(throughput) = bench.throughput_median {
                metrics.push(format!("{throughput:.2} ops/s"));
            }
            if let Some(latency) = bench.latency_median {
                metrics.push(format!("{latency:.3}ms"));
            }
            metrics.push(format!("{} samples", bench.samples));
            line.push_str(&style.gray(format!(" ({})", metrics.join(", "))));
        }

        line.push('\n');
        line
    }

    /// Run totals with percentages
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        let style = self.style();
        let stats = &summary.stats;
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", "━".repeat(60)));

        let unit_failures = summary.units.iter().filter(|r| r.status.is_failure()).count();
        output.push_str(&format!(
            "Units:   {} total, {} failed\n",
            summary.units.len(),
            unit_failures
        ));

        let failed = format!("{} failed", stats.failed);
        let failed = if stats.failed > 0 {
            style.red(failed)
        } else {
            failed
        };
        output.push_str(&format!(
            "Tests:   {} total | {} ({:.1}%) | {} ({:.1}%) | {} softfailed | {} skipped | {} todo\n",
            stats.total,
            style.green(format!("{} passed", stats.passed)),
            stats.percent(stats.passed),
            failed,
            stats.percent(stats.failed),
            stats.softfailed,
            stats.skipped,
            stats.todo
        ));

        let verdict = format!(
            "{} {}",
            summary.verdict.symbol(),
            summary.verdict.to_string().to_uppercase()
        );
        output.push_str(&format!(
            "Verdict: {}\n",
            style.paint(summary.verdict.color(), verdict)
        ));
        output.push_str(&format!("Time:    {:.2}s", summary.elapsed_secs()));

        output
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|line| format!("{prefix}{line}\n")).collect()
}
