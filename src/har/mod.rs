//! HAR assembly and persistence

mod builder;
mod model;

use std::path::Path;

use tracing::info;

use crate::event::RecordedEvent;
use crate::Result;

pub use builder::MessageHarBuilder;
pub use model::{
    HarCache, HarContent, HarCreator, HarDocument, HarEntry, HarLog, HarNameValue, HarPage,
    HarPageTimings, HarPostData, HarRequest, HarResponse, HarTimings, HAR_VERSION,
};

/// Options passed to [`HarAssembler::build`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Copy captured response bodies into `content.text`
    pub include_body: bool,
}

/// Turns an ordered protocol message log into a HAR document
pub trait HarAssembler: Send + Sync {
    /// Build a document from `events`
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be assembled
    fn build(&self, events: &[RecordedEvent], options: BuildOptions) -> Result<HarDocument>;
}

/// Write `document` as compact JSON to `path`
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub async fn write_document(path: &Path, document: &HarDocument) -> Result<()> {
    let data = serde_json::to_vec(document)?;
    tokio::fs::write(path, &data).await?;

    info!(
        "Wrote HAR with {} entries to {} ({} bytes)",
        document.log.entries.len(),
        path.display(),
        data.len()
    );
    Ok(())
}

/// Read a HAR document from `path`
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a HAR document
pub async fn read_document(path: &Path) -> Result<HarDocument> {
    let data = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trace.har");

        let document = MessageHarBuilder::default()
            .build(&[], BuildOptions::default())
            .unwrap();
        write_document(&path, &document).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["log"]["version"], HAR_VERSION);
        assert_eq!(raw["log"]["entries"].as_array().unwrap().len(), 0);

        assert_eq!(read_document(&path).await.unwrap(), document);
    }
}
