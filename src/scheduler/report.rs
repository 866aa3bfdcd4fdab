//! Human-readable status report assembled once per tick.

use crate::probe::{Classification, ProbeOutcome};
use std::fmt;

/// One block of lines per endpoint, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    text: String,
}

impl StatusReport {
    pub fn from_outcomes(outcomes: &[ProbeOutcome]) -> Self {
        let mut text = String::new();
        for outcome in outcomes {
            render_outcome(outcome, &mut text);
        }
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn render_outcome(outcome: &ProbeOutcome, out: &mut String) {
    let url = &outcome.endpoint;
    let lines: Vec<String> = outcome
        .observations
        .iter()
        .map(|o| match &o.classification {
            Classification::Up => format!("[{}] {} is up", o.timestamp, url),
            Classification::CriticalDown(code) => {
                format!("[{}] {} is down. Status code: {}", o.timestamp, url, code)
            }
            Classification::SoftError(code) => format!(
                "[{}] {} returned an error. Status code: {}",
                o.timestamp, url, code
            ),
            Classification::TransportError(message) => format!(
                "[{}] Error checking {} uptime: {}",
                o.timestamp, url, message
            ),
        })
        .collect();

    let last = lines.len().saturating_sub(1);
    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        if i == last && outcome.attempts > 1 {
            out.push_str(&format!(" (retries: {})", outcome.attempts));
        }
        out.push('\n');
    }

    if let Some(detail) = &outcome.error_detail {
        out.push_str(&format!("[{}] {} error: {}\n", outcome.timestamp, url, detail));
    }
}
