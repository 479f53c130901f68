//! Pipe traverser: a stream on stdin/stdout is exactly one object.

use tokio_util::sync::CancellationToken;

use ferry_core::{FerryError, FilterChain, ObjectProcessor, RelativePath, StoredObject};

use crate::TraversalSummary;

pub struct PipeTraverser {
    name: String,
}

impl PipeTraverser {
    /// `name` is the object name the piped bytes will land under.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub async fn traverse(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, FerryError> {
        if cancel.is_cancelled() {
            return Err(FerryError::Cancelled);
        }
        let mut summary = TraversalSummary { seen: 1, ..Default::default() };
        // Size is unknown until the stream is drained by the execution layer.
        let mut object = StoredObject::file(RelativePath::root(), 0, None);
        object.name = self.name.clone();
        crate::feed(processor, filters, object, &mut summary).await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::CollectProcessor;

    #[tokio::test]
    async fn pipe_is_one_unnamed_root_object() {
        let traverser = PipeTraverser::new("stream.bin");
        let mut sink = CollectProcessor::default();
        let summary = traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.emitted, 1);
        assert_eq!(sink.objects[0].name, "stream.bin");
        assert!(sink.objects[0].relative_path.is_root());
    }
}
