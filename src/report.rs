//! Per-host results and their aggregation by group.
//!
//! A result is created once by a worker, travels once over IPC and is then
//! owned by the [`ResultAggregator`]. The aggregator redacts secrets before it
//! echoes or stores anything.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::commands::Phase;
use crate::config::{HostConfig, expand_tilde};

/// Final state of one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Failed,
    Skipped,
}

/// Output lines per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutput {
    #[serde(default)]
    pub cmds_before: Vec<String>,
    #[serde(default)]
    pub cmds_after: Vec<String>,
    #[serde(default)]
    pub conf_cmds: Vec<String>,
}

impl PhaseOutput {
    pub fn phase(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::Before => &self.cmds_before,
            Phase::Config => &self.conf_cmds,
            Phase::After => &self.cmds_after,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut Vec<String> {
        match phase {
            Phase::Before => &mut self.cmds_before,
            Phase::Config => &mut self.conf_cmds,
            Phase::After => &mut self.cmds_after,
        }
    }

    /// All lines in execution order: before, configuration, after.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        [Phase::Before, Phase::Config, Phase::After]
            .into_iter()
            .flat_map(|phase| self.phase(phase).iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.cmds_before.is_empty() && self.conf_cmds.is_empty() && self.cmds_after.is_empty()
    }
}

/// The outcome of one host, as sent over IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub group: String,
    pub host: String,
    /// At most one entry; empty unless the host failed.
    pub errors: Vec<String>,
    /// `0` for ok, `1` for failed, `None` for skipped.
    pub rc: Option<i32>,
    pub message: Outcome,
    #[serde(default)]
    pub output: PhaseOutput,
    pub config: HostConfig,
}

impl ExecutionResult {
    pub fn ok(group: impl Into<String>, config: HostConfig, output: PhaseOutput) -> Self {
        Self {
            group: group.into(),
            host: config.host.clone(),
            errors: Vec::new(),
            rc: Some(0),
            message: Outcome::Ok,
            output,
            config,
        }
    }

    /// A failed host keeps the output captured before the failure.
    pub fn failed(
        group: impl Into<String>,
        config: HostConfig,
        output: PhaseOutput,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            group: group.into(),
            host: config.host.clone(),
            errors: vec![error.to_string()],
            rc: Some(1),
            message: Outcome::Failed,
            output,
            config,
        }
    }

    /// A host that was never launched because it has no credentials.
    pub fn skipped(group: impl Into<String>, config: HostConfig) -> Self {
        Self {
            group: group.into(),
            host: config.host.clone(),
            errors: Vec::new(),
            rc: None,
            message: Outcome::Skipped,
            output: PhaseOutput::default(),
            config,
        }
    }

    /// Replaces password and encrypted password with a placeholder.
    pub fn redact(&mut self) {
        self.config.credentials.redact();
    }

    pub fn is_ok(&self) -> bool {
        self.message == Outcome::Ok
    }

    /// Whether the host asked for its per-result echo to be suppressed.
    pub fn is_silent(&self) -> bool {
        self.config
            .settings
            .get("silent")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// The `log_file` setting with `~` expanded, if any.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.config
            .settings
            .get("log_file")
            .and_then(serde_json::Value::as_str)
            .map(|path| expand_tilde(Path::new(path)))
    }

    /// Writes every output line to the host's `log_file`, truncating it.
    ///
    /// Returns the path written, or `None` when no log file is configured.
    pub async fn write_host_log(&self) -> std::io::Result<Option<PathBuf>> {
        let Some(path) = self.log_file() else {
            return Ok(None);
        };
        let mut content = String::new();
        for line in self.output.lines() {
            content.push_str(line);
            content.push('\n');
        }
        tokio::fs::write(&path, content).await?;
        Ok(Some(path))
    }
}

/// Counts of hosts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Results grouped by group name, in arrival order.
///
/// Serializes to `{group: [{host: {errors, rc, message, output, config}}]}`.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    groups: Vec<(String, Vec<ExecutionResult>)>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redacts the result, echoes it to the log and stores it.
    pub fn add(&mut self, mut result: ExecutionResult) {
        result.redact();

        match result.message {
            Outcome::Ok => info!("   ✓    {}", result.host),
            Outcome::Failed => error!(
                "   ⨯    {}: {}",
                result.host,
                result.errors.first().map(String::as_str).unwrap_or_default()
            ),
            Outcome::Skipped => warn!("   ✝    {} no credentials found, skipped", result.host),
        }

        if !result.is_silent() && result.message != Outcome::Skipped {
            match serde_yaml::to_string(&result) {
                Ok(dump) => {
                    for line in dump.lines() {
                        info!("    {line}");
                    }
                }
                Err(err) => warn!("cannot render result of {}: {err}", result.host),
            }
        }

        match self.groups.iter_mut().find(|(name, _)| *name == result.group) {
            Some((_, results)) => results.push(result),
            None => self.groups.push((result.group.clone(), vec![result])),
        }
    }

    /// Group names in order of first arrival.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    /// Results of one group in arrival order.
    pub fn group(&self, name: &str) -> Option<&[ExecutionResult]> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, results)| results.as_slice())
    }

    /// All results, grouped.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[ExecutionResult])> {
        self.groups
            .iter()
            .map(|(name, results)| (name.as_str(), results.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, results)| results.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (_, results) in &self.groups {
            for result in results {
                match result.message {
                    Outcome::Ok => summary.ok += 1,
                    Outcome::Failed => summary.failed += 1,
                    Outcome::Skipped => summary.skipped += 1,
                }
            }
        }
        summary
    }
}

impl Serialize for ResultAggregator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (group, results) in &self.groups {
            let entries: Vec<HostEntry<'_>> = results.iter().map(HostEntry).collect();
            map.serialize_entry(group, &entries)?;
        }
        map.end()
    }
}

/// One `{host: {...}}` entry of the grouped view.
struct HostEntry<'a>(&'a ExecutionResult);

#[derive(Serialize)]
struct HostView<'a> {
    errors: &'a [String],
    rc: Option<i32>,
    message: Outcome,
    output: &'a PhaseOutput,
    config: &'a HostConfig,
}

impl Serialize for HostEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let result = self.0;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &result.host,
            &HostView {
                errors: &result.errors,
                rc: result.rc,
                message: result.message,
                output: &result.output,
                config: &result.config,
            },
        )?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, REDACTED, ResolvedCredentials, Secret};
    use serde_json::json;

    fn host(name: &str) -> HostConfig {
        let mut config = HostConfig::new(name, Default::default());
        config.credentials = Credentials::Present(ResolvedCredentials {
            user: "admin".to_string(),
            host: name.to_string(),
            encrypted_pass: Secret::new("c2VjcmV0"),
            pass: Secret::new("hunter2"),
        });
        config
    }

    fn output() -> PhaseOutput {
        PhaseOutput {
            cmds_before: vec!["before".to_string()],
            cmds_after: vec!["after".to_string()],
            conf_cmds: vec!["conf".to_string()],
        }
    }

    #[test]
    fn constructors_set_rc_and_message() {
        let ok = ExecutionResult::ok("edge", host("sw-01"), output());
        assert_eq!((ok.rc, ok.message), (Some(0), Outcome::Ok));
        assert!(ok.errors.is_empty());

        let failed = ExecutionResult::failed("edge", host("sw-02"), output(), "boom");
        assert_eq!((failed.rc, failed.message), (Some(1), Outcome::Failed));
        assert_eq!(failed.errors, vec!["boom".to_string()]);
        assert_eq!(failed.output, output());

        let skipped = ExecutionResult::skipped("edge", HostConfig::new("sw-03", Default::default()));
        assert_eq!((skipped.rc, skipped.message), (None, Outcome::Skipped));
        assert!(skipped.output.is_empty());
    }

    #[test]
    fn wire_format_matches_ipc_message() {
        let result = ExecutionResult::skipped("edge", HostConfig::new("sw-03", Default::default()));
        let value = serde_json::to_value(&result).expect("serialize");

        assert_eq!(value["group"], json!("edge"));
        assert_eq!(value["host"], json!("sw-03"));
        assert_eq!(value["rc"], json!(null));
        assert_eq!(value["message"], json!("skipped"));
        assert_eq!(value["output"]["conf_cmds"], json!([]));
        assert_eq!(value["config"]["credentials"], json!(false));
    }

    #[test]
    fn result_without_output_decodes() {
        let value = json!({
            "group": "edge",
            "host": "sw-01",
            "errors": [],
            "rc": null,
            "message": "skipped",
            "config": {"host": "sw-01", "settings": {}, "credentials": false}
        });
        let result: ExecutionResult = serde_json::from_value(value).expect("decode");
        assert!(result.output.is_empty());
        assert!(result.config.credentials.is_absent());
    }

    #[test]
    fn aggregator_redacts_before_storing() {
        let mut aggregator = ResultAggregator::new();
        aggregator.add(ExecutionResult::ok("edge", host("sw-01"), output()));

        let stored = &aggregator.group("edge").expect("group")[0];
        let Credentials::Present(credentials) = &stored.config.credentials else {
            panic!("credentials should stay present");
        };
        assert_eq!(credentials.pass.expose(), REDACTED);
        assert_eq!(credentials.encrypted_pass.expose(), REDACTED);
        assert_eq!(credentials.user, "admin");
    }

    #[test]
    fn aggregator_groups_in_arrival_order() {
        let mut aggregator = ResultAggregator::new();
        aggregator.add(ExecutionResult::ok("core", host("c-2"), output()));
        aggregator.add(ExecutionResult::skipped("edge", HostConfig::new("e-1", Default::default())));
        aggregator.add(ExecutionResult::failed("core", host("c-1"), PhaseOutput::default(), "x"));

        assert_eq!(aggregator.group_names().collect::<Vec<_>>(), vec!["core", "edge"]);
        let core: Vec<_> = aggregator
            .group("core")
            .expect("core")
            .iter()
            .map(|r| r.host.as_str())
            .collect();
        assert_eq!(core, vec!["c-2", "c-1"]);
        assert_eq!(aggregator.len(), 3);
        assert_eq!(
            aggregator.summary(),
            RunSummary {
                ok: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert!(aggregator.group("missing").is_none());
    }

    #[test]
    fn grouped_view_shape() {
        let mut aggregator = ResultAggregator::new();
        aggregator.add(ExecutionResult::ok("edge", host("sw-01"), output()));

        let value = serde_json::to_value(&aggregator).expect("serialize");
        let entry = &value["edge"][0]["sw-01"];
        assert_eq!(entry["message"], json!("ok"));
        assert_eq!(entry["rc"], json!(0));
        assert_eq!(entry["output"]["cmds_before"], json!(["before"]));
        assert_eq!(entry["config"]["credentials"]["pass"], json!(REDACTED));
        assert!(entry.get("group").is_none());
        assert!(entry.get("host").is_none());
    }

    #[tokio::test]
    async fn host_log_contains_lines_in_execution_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sw-01.log");
        let mut config = host("sw-01");
        config
            .settings
            .insert("log_file".to_string(), json!(path.to_string_lossy()));

        let result = ExecutionResult::ok("edge", config, output());
        let written = result.write_host_log().await.expect("write log");

        assert_eq!(written.as_deref(), Some(path.as_path()));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read log"),
            "before\nconf\nafter\n"
        );
    }

    #[tokio::test]
    async fn host_log_is_optional() {
        let result = ExecutionResult::ok("edge", host("sw-01"), output());
        assert!(result.write_host_log().await.expect("no log").is_none());
    }
}
