//! Human and JSON renderings of command results

use docsync_core::domain::PairState;
use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// Structured result; ignored by the human formatter
    fn print_json(&self, value: &Value);
    /// State of each child of a folder
    fn print_states(&self, states: &[(String, PairState)]);
}

/// One `<state>\t<name>` status line
pub fn status_line(name: &str, state: PairState) -> String {
    format!("{}\t{}", state.as_str(), name)
}

/// Checkmark-prefixed messages, status lines on stdout
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &Value) {}
    fn print_states(&self, states: &[(String, PairState)]) {
        let lines: Vec<String> = states
            .iter()
            .map(|(name, state)| status_line(name, *state))
            .collect();
        if !lines.is_empty() {
            println!("{}", lines.join("\n"));
        }
    }
}

/// One JSON document per message
pub struct JsonFormatter;

impl JsonFormatter {
    fn emit(value: Value, to_stderr: bool) {
        if to_stderr {
            eprintln!("{value}");
        } else {
            println!("{value}");
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        Self::emit(json!({"success": true, "message": message}), false);
    }
    fn error(&self, message: &str) {
        Self::emit(json!({"success": false, "error": message}), true);
    }
    fn warn(&self, message: &str) {
        Self::emit(json!({"level": "warning", "message": message}), true);
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
    fn print_states(&self, states: &[(String, PairState)]) {
        self.print_json(&states_json(states));
    }
}

fn states_json(states: &[(String, PairState)]) -> Value {
    states
        .iter()
        .map(|(name, state)| json!({"name": name, "state": state.as_str()}))
        .collect()
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}
