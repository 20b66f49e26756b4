//! Subject-routed mail handling.
//!
//! The rule table is a JSON array read from the `rule_file` parameter on every
//! invocation. The first rule whose `subject_filter` is `*` or a substring of
//! the item's name decides the task directory and which action handles the
//! attachments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Parameters, ProcessorKind};
use crate::error::ProcessorError;
use crate::items::{Item, sanitize_file_name};
use crate::processors::processor::{Processor, loose_bool, param_str};

/// Filter value that matches every subject.
pub const MATCH_ALL: &str = "*";

/// One row of the workflow rule table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowRule {
    #[serde(default = "match_all", deserialize_with = "deserialize_filter")]
    pub subject_filter: String,
    pub task_name: String,
    pub action_id: String,
    #[serde(default, deserialize_with = "deserialize_loose_bool")]
    pub require_attachment: bool,
}

impl WorkflowRule {
    pub fn matches(&self, subject: &str) -> bool {
        self.subject_filter == MATCH_ALL || subject.contains(&self.subject_filter)
    }
}

fn match_all() -> String {
    MATCH_ALL.to_string()
}

fn deserialize_filter<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => match_all(),
        other => other.to_string(),
    })
}

fn deserialize_loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(loose_bool(&value).unwrap_or(false))
}

/// Parse a workflow rule table.
pub fn parse_rule_table(json: &str) -> Result<Vec<WorkflowRule>, serde_json::Error> {
    serde_json::from_str(json)
}

/// First rule matching `subject`.
pub fn find_rule<'a>(rules: &'a [WorkflowRule], subject: &str) -> Option<&'a WorkflowRule> {
    rules.iter().find(|rule| rule.matches(subject))
}

pub struct MailWorkflowProcessor {
    save: Arc<dyn Processor>,
    ocr: Arc<dyn Processor>,
    unzip: Arc<dyn Processor>,
}

impl MailWorkflowProcessor {
    pub fn new(
        save: Arc<dyn Processor>,
        ocr: Arc<dyn Processor>,
        unzip: Arc<dyn Processor>,
    ) -> Self {
        Self { save, ocr, unzip }
    }

    /// Action handler for `action_id`; unknown ids fall back to saving.
    fn action(&self, action_id: &str) -> &Arc<dyn Processor> {
        match action_id.trim() {
            "ocr_process" => &self.ocr,
            "unzip_process" => &self.unzip,
            "save_process" => &self.save,
            other => {
                debug!(action = %other, "Unknown workflow action, saving instead");
                &self.save
            }
        }
    }

    async fn load_rules(path: &Path) -> Result<Vec<WorkflowRule>, ProcessorError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProcessorError::RuleTable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        parse_rule_table(&raw).map_err(|e| ProcessorError::RuleTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Processor for MailWorkflowProcessor {
    fn id(&self) -> &str {
        ProcessorKind::MailWorkflow.as_str()
    }

    fn description(&self) -> &str {
        "Route a mail by subject using an external rule table"
    }

    async fn process(
        &self,
        item: &dyn Item,
        output_dir: &Path,
        params: &Parameters,
    ) -> Result<(), ProcessorError> {
        let Some(rule_file) = param_str(params, "rule_file").map(PathBuf::from) else {
            warn!(item = %item.name(), "No rule_file parameter, skipping workflow");
            return Ok(());
        };
        if !tokio::fs::try_exists(&rule_file).await.unwrap_or(false) {
            warn!(rule_file = %rule_file.display(), "Workflow rule file not found");
            return Ok(());
        }

        let rules = Self::load_rules(&rule_file).await?;
        let subject = item.name();
        let Some(rule) = find_rule(&rules, subject) else {
            debug!(item = %subject, "No workflow rule matched");
            return Ok(());
        };

        info!(task = %rule.task_name, item = %subject, "Workflow check");

        let task_dir = output_dir.join(sanitize_file_name(&rule.task_name));
        tokio::fs::create_dir_all(&task_dir).await?;

        let children = item.children().await;
        if children.is_empty() {
            if rule.require_attachment {
                debug!(item = %subject, task = %rule.task_name, "Attachment required, skipping");
                return Ok(());
            }
            let path = item.persist(&task_dir).await?;
            info!(item = %subject, path = %path.display(), "Saved message body");
            return Ok(());
        }

        let action = self.action(&rule.action_id);
        for child in &children {
            if let Err(e) = action.process(child.as_ref(), &task_dir, params).await {
                error!(
                    item = %child.name(),
                    action = %action.id(),
                    error = %e,
                    "Workflow action failed"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::mail::AttachmentItem;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Mail {
        subject: String,
        attachments: Vec<AttachmentItem>,
    }

    #[async_trait]
    impl Item for Mail {
        fn name(&self) -> &str {
            &self.subject
        }
        fn extension(&self) -> String {
            ".msg".into()
        }
        fn is_container(&self) -> bool {
            true
        }
        async fn children(&self) -> Vec<Box<dyn Item>> {
            self.attachments
                .iter()
                .cloned()
                .map(|a| Box::new(a) as Box<dyn Item>)
                .collect()
        }
        async fn persist(&self, directory: &Path) -> Result<PathBuf, crate::error::ItemError> {
            crate::items::write_into(directory, &format!("{}.eml", self.subject), b"raw").await
        }
    }

    /// Records `(processor, item, output_dir)` for every call.
    struct Recorder {
        id: &'static str,
        calls: Arc<Mutex<Vec<(String, String, PathBuf)>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Processor for Recorder {
        fn id(&self) -> &str {
            self.id
        }
        fn description(&self) -> &str {
            "records calls"
        }
        async fn process(
            &self,
            item: &dyn Item,
            output_dir: &Path,
            _params: &Parameters,
        ) -> Result<(), ProcessorError> {
            self.calls.lock().unwrap().push((
                self.id.to_string(),
                item.name().to_string(),
                output_dir.to_path_buf(),
            ));
            if self.fail_on == Some(item.name()) {
                return Err(ProcessorError::Recognition("boom".into()));
            }
            Ok(())
        }
    }

    type Calls = Arc<Mutex<Vec<(String, String, PathBuf)>>>;

    fn workflow(fail_on: Option<&'static str>) -> (MailWorkflowProcessor, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let make = |id: &'static str| -> Arc<dyn Processor> {
            Arc::new(Recorder {
                id,
                calls: Arc::clone(&calls),
                fail_on,
            })
        };
        let processor = MailWorkflowProcessor::new(make("save"), make("ocr"), make("unzip"));
        (processor, calls)
    }

    fn write_table(dir: &Path, json: &str) -> Parameters {
        let path = dir.join("rules.json");
        std::fs::write(&path, json).unwrap();
        let mut params = Parameters::new();
        params.insert("rule_file".into(), path.display().to_string().into());
        params
    }

    fn mail(subject: &str, attachments: &[&str]) -> Mail {
        Mail {
            subject: subject.into(),
            attachments: attachments
                .iter()
                .map(|name| AttachmentItem::new(*name, b"x".to_vec()))
                .collect(),
        }
    }

    #[test]
    fn rule_table_tolerates_string_booleans_and_missing_filter() {
        let rules = parse_rule_table(
            r#"[
                {"subject_filter": "請求書", "task_name": "Invoices", "action_id": "ocr_process", "require_attachment": "TRUE"},
                {"task_name": "General", "action_id": "save_process", "require_attachment": null},
                {"subject_filter": 2024, "task_name": "Year", "action_id": "save_process", "require_attachment": false}
            ]"#,
        )
        .unwrap();

        assert!(rules[0].require_attachment);
        assert_eq!(rules[1].subject_filter, MATCH_ALL);
        assert!(!rules[1].require_attachment);
        assert_eq!(rules[2].subject_filter, "2024");
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = parse_rule_table(
            r#"[
                {"subject_filter": "Invoice", "task_name": "A", "action_id": "ocr_process"},
                {"subject_filter": "*", "task_name": "B", "action_id": "save_process"}
            ]"#,
        )
        .unwrap();

        assert_eq!(find_rule(&rules, "Invoice 42").unwrap().task_name, "A");
        assert_eq!(find_rule(&rules, "Hello").unwrap().task_name, "B");
        assert!(find_rule(&rules[..1], "Hello").is_none());
    }

    #[tokio::test]
    async fn wildcard_without_attachments_saves_the_body() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(
            dir.path(),
            r#"[{"subject_filter": "*", "task_name": "General", "action_id": "save_process", "require_attachment": false}]"#,
        );
        let (processor, calls) = workflow(None);
        let out = dir.path().join("out");

        processor.process(&mail("Hello", &[]), &out, &params).await.unwrap();

        assert!(out.join("General").join("Hello.eml").exists());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn required_attachment_missing_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(
            dir.path(),
            r#"[{"subject_filter": "*", "task_name": "Strict", "action_id": "save_process", "require_attachment": "true"}]"#,
        );
        let (processor, calls) = workflow(None);
        let out = dir.path().join("out");

        processor.process(&mail("Hello", &[]), &out, &params).await.unwrap();

        assert!(!out.join("Strict").join("Hello.eml").exists());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn attachments_go_to_the_mapped_action() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(
            dir.path(),
            r#"[{"subject_filter": "Invoice", "task_name": "Invoices", "action_id": "ocr_process", "require_attachment": true}]"#,
        );
        let (processor, calls) = workflow(None);
        let out = dir.path().join("out");

        processor
            .process(&mail("Invoice May", &["a.pdf", "b.pdf"]), &out, &params)
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("ocr".to_string(), "a.pdf".to_string(), out.join("Invoices")));
        assert_eq!(calls[1].1, "b.pdf");
    }

    #[tokio::test]
    async fn unknown_action_falls_back_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(
            dir.path(),
            r#"[{"subject_filter": "*", "task_name": "T", "action_id": "print_process"}]"#,
        );
        let (processor, calls) = workflow(None);

        processor
            .process(&mail("x", &["a.zip"]), dir.path(), &params)
            .await
            .unwrap();

        assert_eq!(calls.lock().unwrap()[0].0, "save");
    }

    #[tokio::test]
    async fn failing_child_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(
            dir.path(),
            r#"[{"subject_filter": "*", "task_name": "T", "action_id": "unzip_process"}]"#,
        );
        let (processor, calls) = workflow(Some("first.zip"));

        processor
            .process(&mail("x", &["first.zip", "second.zip"]), dir.path(), &params)
            .await
            .unwrap();

        let names: Vec<String> = calls.lock().unwrap().iter().map(|c| c.1.clone()).collect();
        assert_eq!(names, vec!["first.zip", "second.zip"]);
    }

    #[tokio::test]
    async fn no_matching_rule_is_a_silent_skip() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(
            dir.path(),
            r#"[{"subject_filter": "Invoice", "task_name": "T", "action_id": "save_process"}]"#,
        );
        let (processor, calls) = workflow(None);
        let out = dir.path().join("out");

        processor.process(&mail("Hello", &["a.pdf"]), &out, &params).await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn missing_rule_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, calls) = workflow(None);
        let mut params = Parameters::new();
        params.insert("rule_file".into(), "/no/such/rules.json".into());

        processor.process(&mail("x", &["a.pdf"]), dir.path(), &params).await.unwrap();
        processor
            .process(&mail("x", &["a.pdf"]), dir.path(), &Parameters::new())
            .await
            .unwrap();

        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_rule_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let params = write_table(dir.path(), "{ not json");
        let (processor, _calls) = workflow(None);

        let err = processor
            .process(&mail("x", &[]), dir.path(), &params)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::RuleTable { .. }));
    }
}
