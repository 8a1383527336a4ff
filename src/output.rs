use serde_json::Value;

/// Abstraction over user-facing output.
///
/// Command modules describe results twice: as human-readable lines through
/// `status`/`success`, and as structured data through `data`. Each
/// implementation renders the half it understands.
pub trait UserOutput: Send + Sync {
    /// Informational line (e.g., a table row).
    fn status(&self, message: &str);

    /// Outcome of a mutating command.
    fn success(&self, message: &str);

    fn warning(&self, message: &str);

    /// Machine-readable result.
    fn data(&self, value: &Value);
}

/// Standard CLI output: plain text to stdout, warnings to stderr.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn data(&self, _value: &Value) {}
}

/// `--json` output: one JSON document per command on stdout.
pub struct JsonOutput;

impl UserOutput for JsonOutput {
    fn status(&self, _message: &str) {}

    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({ "ok": true, "message": message }));
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn data(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", value),
        }
    }
}
