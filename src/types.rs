use std::str::FromStr;
use serde::Deserialize;

/// Execution substrate used to launch the tasks of a chain.
///
/// - `Thread`: one OS thread per task (default).
/// - `Tokio`: tasks run on the tokio blocking pool of the current runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Thread,
    Tokio,
}

impl Default for ExecutorKind {
    fn default() -> Self {
        ExecutorKind::Thread
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "thread" => Ok(ExecutorKind::Thread),
            "tokio" => Ok(ExecutorKind::Tokio),
            other => Err(format!(
                "invalid executor: {other} (expected \"thread\" or \"tokio\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_executor_kind_case_insensitively() {
        assert_eq!("Thread".parse::<ExecutorKind>(), Ok(ExecutorKind::Thread));
        assert_eq!(" tokio ".parse::<ExecutorKind>(), Ok(ExecutorKind::Tokio));
        assert!("rayon".parse::<ExecutorKind>().is_err());
    }
}
