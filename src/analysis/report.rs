use std::fmt::{self, Display};
use approx::relative_eq;
use itertools::Itertools;
use crate::params::ParameterAssignment;
use super::{DirectionMargin, MarginResult, OptimizationState, YieldResult};

/// Whatever an aborted analysis finished before the error
#[derive(Debug, Clone)]
pub enum PartialResult {
    Margin(Vec<DirectionMargin>),
    Yield { passes: usize, total: usize },
    Optimize(OptimizationState),
}

impl Display for PartialResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Margin(margins) => {
                writeln!(f, "Finished margins:")?;
                for margin in margins {
                    writeln!(f, "  {}: {:.1} %", margin.label(), margin.margin * 100.0)?;
                }
                Ok(())
            }
            Self::Yield { passes, total } => writeln!(f, "Yield before abort: {} / {}", passes, total),
            Self::Optimize(state) => {
                writeln!(f, "Best after {} iterations: {:.1} %", state.iteration, state.best_score * 100.0)?;
                write_params(f, &state.best)
            }
        }
    }
}

pub const DEFAULT_COLUMNS: usize = 80;

fn bar(percentage: f64, size: usize, left: bool) -> String {
    let filled = ((percentage / 100.0 * size as f64) as usize).min(size);
    let (filled, empty) = ("#".repeat(filled), " ".repeat(size - filled));
    if left { empty + &filled } else { filled + &empty }
}

impl MarginResult {
    /// One bar per parameter, lower margin to the left of the center line
    pub fn bar_chart(&self, columns: usize) -> String {
        let key_size = self.margins.iter().map(|m| m.name.len()).max().unwrap_or(0);
        let mut usable = columns.saturating_sub(15 + key_size).max(2);

        let mut adjust = "";
        if relative_eq!(1.0 - self.settings.min_search, self.settings.max_search - 1.0, max_relative = 1e-9) && usable % 2 == 1 {
            adjust = " ";
            usable -= 1;
        }
        let half = usable / 2;

        let mut chart = String::new();
        for margin in self.margins.iter() {
            let left = -margin.lower * 100.0;
            let right = margin.upper * 100.0;
            chart.push_str(&format!(
                "{:<width$}: {}{:>4.1} [{}|{}] {:>4.1}\n",
                margin.name,
                adjust,
                left,
                bar(left, half, true),
                bar(right, half, false),
                right,
                width = key_size,
            ));
        }
        chart
    }
}

impl Display for MarginResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bar_chart(DEFAULT_COLUMNS))?;
        writeln!(
            f,
            "Critical margin: {:>4.1} % [{}]",
            self.critical.margin * 100.0,
            self.critical.labels.iter().map(|l| format!("'{}'", l)).join(", ")
        )
    }
}

impl Display for YieldResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Yield: {} / {} = {:.1} %", self.passes, self.total, self.percentage())
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, assignment: &ParameterAssignment) -> fmt::Result {
    for (name, value) in assignment.iter() {
        writeln!(f, ".param {}={}", name, value)?;
    }
    Ok(())
}

impl Display for OptimizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.best_margins)?;
        writeln!(
            f,
            "Optimized critical margin: {:.1} % (start {:.1} %), {} iterations, {:?}",
            self.best_score * 100.0,
            self.nominal_score * 100.0,
            self.iteration,
            self.status,
        )?;
        write_params(f, &self.best)
    }
}
