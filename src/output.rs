//! Shared output formatting for taskdir CLI commands.

use serde::Serialize;

use crate::error::Result;

pub const SCHEMA_VERSION: &str = "taskdir.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &crate::error::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&error_envelope(command, err)?)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_next_steps(err).first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Error envelope: `schema_version`, `command`, `status` ("error"),
/// `error` (`message`, `code`, `kind`, optional `details`) and
/// `next_steps` when there are any. It carries no `warnings`.
pub fn error_envelope(command: &str, err: &crate::error::Error) -> Result<serde_json::Value> {
    #[derive(Serialize)]
    struct ErrorBody {
        message: String,
        code: i32,
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    }

    #[derive(Serialize)]
    struct Envelope<'a> {
        schema_version: &'static str,
        command: &'a str,
        status: &'static str,
        error: ErrorBody,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        next_steps: Vec<String>,
    }

    let payload = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "error",
        error: ErrorBody {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        },
        next_steps: error_next_steps(err),
    };
    Ok(serde_json::to_value(&payload)?)
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

/// First positional argument, skipping flags and the values of the global
/// flags that take one.
fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if matches!(arg.as_str(), "--root" | "--owner") {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "taskdir".to_string()
}

fn error_next_steps(err: &crate::error::Error) -> Vec<String> {
    use crate::error::Error;
    use crate::task::transition::TransitionError;

    match err {
        Error::StoreNotFound(path) => vec![format!("taskdir --root {} init", path.display())],
        Error::TaskNotFound(_) => vec!["taskdir find".to_string()],
        Error::Parse { path, .. } => vec![format!("fix the header in {}", path.display())],
        Error::Validation(err) if err.is_correctable() => vec!["taskdir sync".to_string()],
        Error::Transition(TransitionError::ShouldBeWaiting(_)) => {
            vec!["taskdir update <id> --status waiting --waiting-on <dep>".to_string()]
        }
        Error::Transition(_) => vec!["taskdir update <id> --status todo".to_string()],
        Error::CheckFailed { .. } => vec!["taskdir check --json".to_string()],
        Error::InvalidConfig(_) => vec!["fix .taskdir.toml then retry".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn command_name_skips_global_flags() {
        assert_eq!(command_name_from(args(&["--json", "sync"])), "sync");
        assert_eq!(command_name_from(args(&["--root", "/tmp/x", "find"])), "find");
        assert_eq!(command_name_from(args(&["--quiet"])), "taskdir");
    }

    #[test]
    fn human_output_sections() {
        let mut human = HumanOutput::new("Synced");
        human.push_summary("count", "3");
        human.push_warning("skipped todo/abc_def_123");
        let text = format_human(&human);
        assert!(text.starts_with("Synced\n\nSummary:\n- count: 3"));
        assert!(text.contains("Warnings:\n- skipped todo/abc_def_123"));
        assert!(!text.contains("Next steps"));
    }

    #[test]
    fn next_steps_follow_the_error() {
        let err = crate::error::Error::TaskNotFound("abc_def_123".to_string());
        assert_eq!(error_next_steps(&err), vec!["taskdir find".to_string()]);
    }

    #[test]
    fn error_envelope_shape() {
        let err = crate::error::Error::TaskNotFound("abc_def_123".to_string());
        let envelope = error_envelope("show", &err).expect("envelope");
        assert_eq!(envelope["schema_version"], SCHEMA_VERSION);
        assert_eq!(envelope["command"], "show");
        assert_eq!(envelope["status"], "error");
        assert_eq!(envelope["error"]["code"], err.exit_code());
        assert_eq!(envelope["error"]["kind"], err.kind());
        assert_eq!(envelope["next_steps"][0], "taskdir find");
        assert!(envelope.get("data").is_none());
        assert!(envelope.get("warnings").is_none());
    }
}
