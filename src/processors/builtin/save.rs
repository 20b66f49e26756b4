//! Persist an item verbatim.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Parameters, ProcessorKind};
use crate::error::ProcessorError;
use crate::items::Item;
use crate::processors::processor::Processor;

#[derive(Debug, Default)]
pub struct SaveOnlyProcessor;

#[async_trait]
impl Processor for SaveOnlyProcessor {
    fn id(&self) -> &str {
        ProcessorKind::SaveOnly.as_str()
    }

    fn description(&self) -> &str {
        "Save the item to the output directory without transformation"
    }

    async fn process(
        &self,
        item: &dyn Item,
        output_dir: &Path,
        _params: &Parameters,
    ) -> Result<(), ProcessorError> {
        let path = item.persist(output_dir).await?;
        info!(item = %item.name(), path = %path.display(), "Saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::mail::AttachmentItem;

    #[tokio::test]
    async fn saves_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        let item = AttachmentItem::new("report.pdf", b"data".to_vec());

        SaveOnlyProcessor
            .process(&item, &out, &Parameters::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read(out.join("report.pdf")).unwrap(), b"data");
    }
}
