//! Local filesystem traverser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ferry_core::{
    AttributeProbe, FerryError, FilterChain, HardlinkHandling, NoopAttributeProbe,
    ObjectProcessor, RelativePath, Side, StoredObject, SymlinkHandling,
};

use crate::TraversalSummary;

/// Walks a directory tree (or addresses a single file) on the local
/// filesystem. Entries within a directory are visited in name order so the
/// enumeration is deterministic per instance.
pub struct LocalTraverser {
    root: PathBuf,
    side: Side,
    recursive: bool,
    include_folders: bool,
    symlinks: SymlinkHandling,
    hardlinks: HardlinkHandling,
    probe: Arc<dyn AttributeProbe>,
}

impl LocalTraverser {
    pub fn new(root: impl Into<PathBuf>, side: Side, recursive: bool) -> Self {
        Self {
            root: root.into(),
            side,
            recursive,
            include_folders: false,
            symlinks: SymlinkHandling::default(),
            hardlinks: HardlinkHandling::default(),
            probe: Arc::new(NoopAttributeProbe),
        }
    }

    /// Emit folder objects alongside files, for destinations that materialise
    /// directory structure.
    pub fn with_folders(mut self, include_folders: bool) -> Self {
        self.include_folders = include_folders;
        self
    }

    pub fn with_symlinks(mut self, symlinks: SymlinkHandling) -> Self {
        self.symlinks = symlinks;
        self
    }

    pub fn with_hardlinks(mut self, hardlinks: HardlinkHandling) -> Self {
        self.hardlinks = hardlinks;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn AttributeProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub async fn is_single_object(&self) -> Result<bool, FerryError> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| self.enumeration_failed(0, &e.to_string()))?;
        Ok(meta.is_file())
    }

    pub async fn traverse(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        cancel: &CancellationToken,
    ) -> Result<TraversalSummary, FerryError> {
        let mut summary = TraversalSummary::default();
        let root_meta = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| self.enumeration_failed(0, &e.to_string()))?;

        if root_meta.is_file() {
            summary.seen += 1;
            let mut object = StoredObject::file(
                RelativePath::root(),
                root_meta.len(),
                modified(&root_meta),
            );
            object.name = leaf_name(&self.root);
            match self.probe.attributes(&self.root) {
                Ok(attrs) => object.attrs = attrs,
                Err(err) => {
                    warn!(path = %self.root.display(), error = %err, "attribute probe failed; skipping");
                    summary.skipped_properties += 1;
                    return Ok(summary);
                }
            }
            crate::feed(processor, filters, object, &mut summary).await?;
            return Ok(summary);
        }

        // Cycle guard, only needed when symlinked directories are followed.
        let mut visited: HashSet<PathBuf> = HashSet::new();
        if self.symlinks == SymlinkHandling::Follow {
            if let Ok(canonical) = tokio::fs::canonicalize(&self.root).await {
                visited.insert(canonical);
            }
        }

        let mut stack: Vec<(PathBuf, RelativePath)> =
            vec![(self.root.clone(), RelativePath::root())];
        while let Some((dir, rel_dir)) = stack.pop() {
            if cancel.is_cancelled() {
                debug!(dir = %dir.display(), "local traversal cancelled");
                return Err(FerryError::Cancelled);
            }

            let mut reader = match tokio::fs::read_dir(&dir).await {
                Ok(reader) => reader,
                Err(err) if rel_dir.is_root() => {
                    return Err(self.enumeration_failed(summary.seen, &err.to_string()))
                }
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "unreadable directory skipped");
                    summary.skipped_properties += 1;
                    continue;
                }
            };

            let mut names: Vec<std::ffi::OsString> = Vec::new();
            loop {
                match reader.next_entry().await {
                    Ok(Some(entry)) => names.push(entry.file_name()),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(dir = %dir.display(), error = %err, "directory entry unreadable");
                        summary.skipped_properties += 1;
                    }
                }
            }
            names.sort();

            for name in names {
                if cancel.is_cancelled() {
                    return Err(FerryError::Cancelled);
                }
                summary.seen += 1;
                let display_name = name.to_string_lossy().into_owned();
                let path = dir.join(&name);
                let rel = match rel_dir.join(&display_name) {
                    Ok(rel) => rel,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "unusable entry name skipped");
                        summary.skipped_properties += 1;
                        continue;
                    }
                };
                let meta = match tokio::fs::symlink_metadata(&path).await {
                    Ok(meta) => meta,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "stat failed; entry skipped");
                        summary.skipped_properties += 1;
                        continue;
                    }
                };

                if meta.file_type().is_symlink() {
                    self.visit_symlink(
                        processor, filters, &path, rel, &meta, &mut stack, &mut visited,
                        &mut summary,
                    )
                    .await?;
                } else if meta.is_dir() {
                    if self.include_folders {
                        let object = StoredObject::folder(rel.clone(), modified(&meta));
                        crate::feed(processor, filters, object, &mut summary).await?;
                    }
                    if self.recursive {
                        stack.push((path, rel));
                    }
                } else if meta.is_file() {
                    if self.skip_as_hardlink(&meta) {
                        debug!(path = %path.display(), "hardlink skipped");
                        continue;
                    }
                    let attrs = match self.probe.attributes(&path) {
                        Ok(attrs) => attrs,
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "attribute probe failed; skipping");
                            summary.skipped_properties += 1;
                            continue;
                        }
                    };
                    let object =
                        StoredObject::file(rel, meta.len(), modified(&meta)).with_attrs(attrs);
                    crate::feed(processor, filters, object, &mut summary).await?;
                } else {
                    debug!(path = %path.display(), "special file skipped");
                }
            }
        }
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn visit_symlink(
        &self,
        processor: &mut dyn ObjectProcessor,
        filters: &FilterChain,
        path: &Path,
        rel: RelativePath,
        meta: &std::fs::Metadata,
        stack: &mut Vec<(PathBuf, RelativePath)>,
        visited: &mut HashSet<PathBuf>,
        summary: &mut TraversalSummary,
    ) -> Result<(), FerryError> {
        match self.symlinks {
            SymlinkHandling::Skip => {
                debug!(path = %path.display(), "symlink skipped");
                Ok(())
            }
            SymlinkHandling::Preserve => {
                let target = match tokio::fs::read_link(path).await {
                    Ok(target) => target.to_string_lossy().into_owned(),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "symlink target unreadable; skipped");
                        summary.skipped_properties += 1;
                        return Ok(());
                    }
                };
                let object = StoredObject::symlink(rel, target, modified(meta));
                crate::feed(processor, filters, object, summary).await
            }
            SymlinkHandling::Follow => {
                let target_meta = match tokio::fs::metadata(path).await {
                    Ok(meta) => meta,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "broken symlink skipped");
                        summary.skipped_properties += 1;
                        return Ok(());
                    }
                };
                if target_meta.is_dir() {
                    let canonical = match tokio::fs::canonicalize(path).await {
                        Ok(canonical) => canonical,
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "symlink target unresolvable; skipped");
                            summary.skipped_properties += 1;
                            return Ok(());
                        }
                    };
                    if !visited.insert(canonical) {
                        warn!(path = %path.display(), "symlink cycle detected; not descending");
                        return Ok(());
                    }
                    if self.include_folders {
                        let object = StoredObject::folder(rel.clone(), modified(&target_meta));
                        crate::feed(processor, filters, object, summary).await?;
                    }
                    if self.recursive {
                        stack.push((path.to_path_buf(), rel));
                    }
                    Ok(())
                } else {
                    let object =
                        StoredObject::file(rel, target_meta.len(), modified(&target_meta));
                    crate::feed(processor, filters, object, summary).await
                }
            }
        }
    }

    #[cfg(unix)]
    fn skip_as_hardlink(&self, meta: &std::fs::Metadata) -> bool {
        use std::os::unix::fs::MetadataExt;
        self.hardlinks == HardlinkHandling::Skip && meta.nlink() > 1
    }

    #[cfg(not(unix))]
    fn skip_as_hardlink(&self, _meta: &std::fs::Metadata) -> bool {
        false
    }

    fn enumeration_failed(&self, partial: u64, reason: &str) -> FerryError {
        FerryError::EnumerationFailed {
            side: self.side,
            partial,
            reason: format!("{}: {reason}", self.root.display()),
        }
    }
}

fn modified(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

fn leaf_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{CollectProcessor, EntityType};
    use std::fs;

    fn write(path: &Path, bytes: &[u8]) {
        fs::write(path, bytes).unwrap();
    }

    async fn collect(traverser: &LocalTraverser) -> Vec<StoredObject> {
        let mut sink = CollectProcessor::default();
        traverser
            .traverse(&mut sink, &FilterChain::new(), &CancellationToken::new())
            .await
            .unwrap();
        sink.objects
    }

    #[tokio::test]
    async fn enumerates_nested_tree_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write(&dir.path().join("b.txt"), b"bb");
        write(&dir.path().join("a.txt"), b"a");
        write(&dir.path().join("sub/deep.txt"), b"deep");

        let traverser = LocalTraverser::new(dir.path(), Side::Source, true);
        let objects = collect(&traverser).await;
        let paths: Vec<&str> = objects.iter().map(|o| o.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "sub/deep.txt"]);
        assert_eq!(objects[0].size, 1);
        assert!(objects[0].lmt.is_some());
    }

    #[tokio::test]
    async fn non_recursive_stays_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write(&dir.path().join("top.txt"), b"x");
        write(&dir.path().join("sub/deep.txt"), b"y");

        let traverser = LocalTraverser::new(dir.path(), Side::Source, false);
        let objects = collect(&traverser).await;
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].relative_path.as_str(), "top.txt");
    }

    #[tokio::test]
    async fn folders_emitted_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write(&dir.path().join("sub/f.txt"), b"z");

        let traverser = LocalTraverser::new(dir.path(), Side::Source, true).with_folders(true);
        let objects = collect(&traverser).await;
        assert!(objects
            .iter()
            .any(|o| o.is_folder() && o.relative_path.as_str() == "sub"));
    }

    #[tokio::test]
    async fn single_file_root_uses_empty_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.bin");
        write(&file, b"12345");

        let traverser = LocalTraverser::new(&file, Side::Source, false);
        assert!(traverser.is_single_object().await.unwrap());
        let objects = collect(&traverser).await;
        assert_eq!(objects.len(), 1);
        assert!(objects[0].relative_path.is_root());
        assert_eq!(objects[0].name, "only.bin");
        assert_eq!(objects[0].size, 5);
    }

    #[tokio::test]
    async fn missing_root_is_an_enumeration_failure() {
        let dir = tempfile::tempdir().unwrap();
        let traverser = LocalTraverser::new(dir.path().join("absent"), Side::Source, true);
        let err = traverser
            .traverse(
                &mut CollectProcessor::default(),
                &FilterChain::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::EnumerationFailed { .. }));
    }

    #[tokio::test]
    async fn cancellation_terminates_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.txt"), b"a");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let traverser = LocalTraverser::new(dir.path(), Side::Source, true);
        let err = traverser
            .traverse(&mut CollectProcessor::default(), &FilterChain::new(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_handling_modes() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("real.txt"), b"real");
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let skip = LocalTraverser::new(dir.path(), Side::Source, true);
        assert_eq!(collect(&skip).await.len(), 1);

        let follow = LocalTraverser::new(dir.path(), Side::Source, true)
            .with_symlinks(SymlinkHandling::Follow);
        let followed = collect(&follow).await;
        assert_eq!(followed.len(), 2);
        assert!(followed.iter().all(|o| o.entity == EntityType::File));

        let preserve = LocalTraverser::new(dir.path(), Side::Source, true)
            .with_symlinks(SymlinkHandling::Preserve);
        let preserved = collect(&preserve).await;
        let link = preserved
            .iter()
            .find(|o| o.entity == EntityType::Symlink)
            .unwrap();
        assert!(link.link_target.as_deref().unwrap().ends_with("real.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hardlinks_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("one.txt"), b"1");
        fs::hard_link(dir.path().join("one.txt"), dir.path().join("two.txt")).unwrap();

        let skip = LocalTraverser::new(dir.path(), Side::Source, true)
            .with_hardlinks(HardlinkHandling::Skip);
        assert!(collect(&skip).await.is_empty());

        let follow = LocalTraverser::new(dir.path(), Side::Source, true);
        assert_eq!(collect(&follow).await.len(), 2);
    }
}
