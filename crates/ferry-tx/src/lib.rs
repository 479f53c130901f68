//! # Ferry TX - Filters and the Sync Comparator
//!
//! This crate provides the transform stages of a ferry pipeline: the closed
//! family of object filters, and the comparator that reconciles a source
//! enumeration against a destination index during sync.
//!
//! ## Filter family
//!
//! - **Name patterns**: semicolon-separated shell globs on the leaf name
//! - **Path prefixes**: directory-boundary prefix matches on the relative path
//! - **Regex sets**: unanchored searches over the relative path
//! - **Attributes**: platform attribute-letter masks (local sources)
//! - **Temporal**: include-before / include-after against the LMT
//! - **Blob type** and **container** exclusions
//!
//! Composition lives in [`ferry_core::FilterChain`]: includes OR within a
//! kind and AND across kinds, any matching exclude drops the object, and
//! exclude wins over include.

use chrono::offset::LocalResult;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use glob::Pattern;
use regex::Regex;

use ferry_core::{
    BlobKind, FerryError, FilterKind, FilterScope, ObjectFilter, PlatformAttrs, Polarity,
    RelativePath, ScanCost, StoredObject,
};

pub mod compare;
pub mod index;

pub use compare::{
    LocalMd5Hasher, SourceHasher, SyncComparator, SyncOptions, SyncStats, CLOCK_SKEW_SECS,
};
pub use index::{DestMeta, DestinationIndex, IndexBuilder};

/// Split a semicolon-separated filter argument into its parts.
fn split_parts(arg: &str) -> impl Iterator<Item = &str> {
    arg.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Shell-glob filter on the leaf name. Folders are not subject to name
/// patterns: an include never drops them, an exclude never removes them.
pub struct PatternFilter {
    globs: Vec<Pattern>,
    polarity: Polarity,
}

impl PatternFilter {
    pub fn include(patterns: &str) -> Result<Self, FerryError> {
        Self::new(patterns, Polarity::Include)
    }

    pub fn exclude(patterns: &str) -> Result<Self, FerryError> {
        Self::new(patterns, Polarity::Exclude)
    }

    fn new(patterns: &str, polarity: Polarity) -> Result<Self, FerryError> {
        let globs = split_parts(patterns)
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    FerryError::InvalidArgument(format!("bad name pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if globs.is_empty() {
            return Err(FerryError::InvalidArgument(
                "empty name pattern list".to_string(),
            ));
        }
        Ok(Self { globs, polarity })
    }
}

impl ObjectFilter for PatternFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::NamePattern
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn matches(&self, object: &StoredObject) -> bool {
        if object.is_folder() {
            return self.polarity == Polarity::Include;
        }
        self.globs.iter().any(|g| g.matches(&object.name))
    }
}

/// Prefix filter on the relative path. A prefix matches iff the path equals
/// it or begins with it at a `/` boundary; wildcards are not interpreted.
pub struct PathPrefixFilter {
    prefixes: Vec<RelativePath>,
    polarity: Polarity,
}

impl PathPrefixFilter {
    pub fn include(paths: &str) -> Result<Self, FerryError> {
        Self::new(paths, Polarity::Include)
    }

    pub fn exclude(paths: &str) -> Result<Self, FerryError> {
        Self::new(paths, Polarity::Exclude)
    }

    fn new(paths: &str, polarity: Polarity) -> Result<Self, FerryError> {
        let prefixes = split_parts(paths)
            .map(RelativePath::normalise)
            .collect::<Result<Vec<_>, _>>()?;
        if prefixes.is_empty() {
            return Err(FerryError::InvalidArgument(
                "empty path prefix list".to_string(),
            ));
        }
        Ok(Self { prefixes, polarity })
    }
}

impl ObjectFilter for PathPrefixFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::PathPrefix
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn matches(&self, object: &StoredObject) -> bool {
        self.prefixes
            .iter()
            .any(|p| object.relative_path.starts_with_dir(p))
    }
}

/// Regex filter: unanchored search against the relative path.
pub struct RegexFilter {
    regexes: Vec<Regex>,
    polarity: Polarity,
}

impl RegexFilter {
    pub fn include(patterns: &str) -> Result<Self, FerryError> {
        Self::new(patterns, Polarity::Include)
    }

    pub fn exclude(patterns: &str) -> Result<Self, FerryError> {
        Self::new(patterns, Polarity::Exclude)
    }

    fn new(patterns: &str, polarity: Polarity) -> Result<Self, FerryError> {
        let regexes = split_parts(patterns)
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| FerryError::InvalidArgument(format!("bad regex '{p}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if regexes.is_empty() {
            return Err(FerryError::InvalidArgument("empty regex list".to_string()));
        }
        Ok(Self { regexes, polarity })
    }
}

impl ObjectFilter for RegexFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::PathRegex
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn matches(&self, object: &StoredObject) -> bool {
        let path = object.relative_path.as_str();
        self.regexes.iter().any(|r| r.is_match(path))
    }
}

/// Attribute-letter filter for local sources. A file matches iff it carries
/// at least one of the requested attributes; folders are not subject to it.
pub struct AttributeFilter {
    mask: PlatformAttrs,
    polarity: Polarity,
}

impl AttributeFilter {
    pub fn include(letters: &str) -> Result<Self, FerryError> {
        Ok(Self {
            mask: PlatformAttrs::from_letters(letters)?,
            polarity: Polarity::Include,
        })
    }

    pub fn exclude(letters: &str) -> Result<Self, FerryError> {
        Ok(Self {
            mask: PlatformAttrs::from_letters(letters)?,
            polarity: Polarity::Exclude,
        })
    }
}

impl ObjectFilter for AttributeFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Attribute
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }

    fn applies_to(&self) -> FilterScope {
        FilterScope::Source
    }

    fn cost(&self) -> ScanCost {
        ScanCost::Expensive
    }

    fn matches(&self, object: &StoredObject) -> bool {
        if object.is_folder() {
            return self.polarity == Polarity::Include;
        }
        object.attrs.intersects(self.mask)
    }
}

/// Parse a cutoff timestamp for the temporal filters. A timestamp with no
/// zone is read in the machine's local timezone; on a DST fold the earliest
/// mapping is taken.
pub fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>, FerryError> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
        return Ok(zoned.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|_| {
            FerryError::InvalidArgument(format!("'{raw}' is not an ISO 8601 timestamp"))
        })?;
    let local = match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(FerryError::InvalidArgument(format!(
                "'{raw}' does not exist in the local timezone"
            )))
        }
    };
    Ok(local.with_timezone(&Utc))
}

/// Keeps objects whose LMT is at or before the cutoff. Folders are not
/// subject to temporal filters; objects without an LMT pass.
pub struct BeforeFilter {
    cutoff: DateTime<Utc>,
}

impl BeforeFilter {
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self { cutoff }
    }

    pub fn parse(raw: &str) -> Result<Self, FerryError> {
        Ok(Self::new(parse_cutoff(raw)?))
    }
}

impl ObjectFilter for BeforeFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Before
    }

    fn polarity(&self) -> Polarity {
        Polarity::Include
    }

    fn applies_to(&self) -> FilterScope {
        FilterScope::Source
    }

    fn matches(&self, object: &StoredObject) -> bool {
        if object.is_folder() {
            return true;
        }
        object.lmt.map(|lmt| lmt <= self.cutoff).unwrap_or(true)
    }
}

/// Keeps objects whose LMT is at or after the cutoff.
pub struct AfterFilter {
    cutoff: DateTime<Utc>,
}

impl AfterFilter {
    pub fn new(cutoff: DateTime<Utc>) -> Self {
        Self { cutoff }
    }

    pub fn parse(raw: &str) -> Result<Self, FerryError> {
        Ok(Self::new(parse_cutoff(raw)?))
    }
}

impl ObjectFilter for AfterFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::After
    }

    fn polarity(&self) -> Polarity {
        Polarity::Include
    }

    fn applies_to(&self) -> FilterScope {
        FilterScope::Source
    }

    fn matches(&self, object: &StoredObject) -> bool {
        if object.is_folder() {
            return true;
        }
        object.lmt.map(|lmt| lmt >= self.cutoff).unwrap_or(true)
    }
}

/// Drops objects whose blob-type tag is in the given set.
pub struct BlobTypeFilter {
    excluded: Vec<BlobKind>,
}

impl BlobTypeFilter {
    pub fn exclude(kinds: Vec<BlobKind>) -> Self {
        Self { excluded: kinds }
    }
}

impl ObjectFilter for BlobTypeFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::BlobType
    }

    fn polarity(&self) -> Polarity {
        Polarity::Exclude
    }

    fn matches(&self, object: &StoredObject) -> bool {
        !object.is_folder() && self.excluded.contains(&object.blob_kind)
    }
}

/// Account-level container exclusion.
pub struct ContainerFilter {
    excluded: Vec<String>,
}

impl ContainerFilter {
    pub fn exclude(names: Vec<String>) -> Self {
        Self { excluded: names }
    }
}

impl ObjectFilter for ContainerFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Container
    }

    fn polarity(&self) -> Polarity {
        Polarity::Exclude
    }

    fn matches(&self, object: &StoredObject) -> bool {
        self.excluded.iter().any(|c| c == &object.container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::FilterChain;
    use std::sync::Arc;

    fn file(path: &str) -> StoredObject {
        StoredObject::file(RelativePath::parse(path).unwrap(), 1, None)
    }

    #[test]
    fn include_exclude_patterns_compose() {
        // include=*.pdf;*.jpeg;exactName  exclude=so*;not*;exactName
        let chain = FilterChain::new()
            .with(Arc::new(
                PatternFilter::include("*.pdf;*.jpeg;exactName").unwrap(),
            ))
            .with(Arc::new(PatternFilter::exclude("so*;not*;exactName").unwrap()));

        let accepted: Vec<&str> = [
            "important.pdf",
            "includeSub/amazing.jpeg",
            "sorry.pdf",
            "exactName",
            "sub/exactName",
        ]
        .iter()
        .copied()
        .filter(|p| chain.admits(&file(p)))
        .collect();
        assert_eq!(accepted, vec!["important.pdf", "includeSub/amazing.jpeg"]);
    }

    #[test]
    fn folders_bypass_name_patterns() {
        let chain = FilterChain::new()
            .with(Arc::new(PatternFilter::include("*.pdf").unwrap()))
            .with(Arc::new(PatternFilter::exclude("sub*").unwrap()));
        let folder = StoredObject::folder(RelativePath::parse("subdir").unwrap(), None);
        assert!(chain.admits(&folder));
    }

    #[test]
    fn path_prefix_respects_directory_boundaries() {
        let filter = PathPrefixFilter::include("logs/2024").unwrap();
        assert!(filter.matches(&file("logs/2024/app.log")));
        assert!(filter.matches(&file("logs/2024")));
        assert!(!filter.matches(&file("logs/2024x/app.log")));
        assert!(!filter.matches(&file("other/logs/2024/app.log")));
    }

    #[test]
    fn path_prefix_does_not_interpret_wildcards() {
        let filter = PathPrefixFilter::include("star*dir").unwrap();
        assert!(filter.matches(&file("star*dir/x")));
        assert!(!filter.matches(&file("starXdir/x")));
    }

    #[test]
    fn regex_is_an_unanchored_search() {
        let filter = RegexFilter::include(r"\.log$;^tmp/").unwrap();
        assert!(filter.matches(&file("deep/app.log")));
        assert!(filter.matches(&file("tmp/scratch")));
        assert!(!filter.matches(&file("app.log.bak")));
        assert!(RegexFilter::include("(unclosed").is_err());
    }

    #[test]
    fn attribute_filter_intersects() {
        let filter = AttributeFilter::include("HS").unwrap();
        let hidden = file("h.txt").with_attrs(PlatformAttrs::HIDDEN);
        let archive = file("a.txt").with_attrs(PlatformAttrs::ARCHIVE);
        assert!(filter.matches(&hidden));
        assert!(!filter.matches(&archive));
        assert_eq!(filter.cost(), ScanCost::Expensive);
    }

    #[test]
    fn temporal_filters_are_half_open() {
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let before = BeforeFilter::new(cutoff);
        let after = AfterFilter::new(cutoff);

        let mut at = file("at.txt");
        at.lmt = Some(cutoff);
        let mut older = file("older.txt");
        older.lmt = Some(cutoff - chrono::Duration::seconds(1));
        let mut newer = file("newer.txt");
        newer.lmt = Some(cutoff + chrono::Duration::seconds(1));

        assert!(before.matches(&at));
        assert!(before.matches(&older));
        assert!(!before.matches(&newer));
        assert!(after.matches(&at));
        assert!(!after.matches(&older));
        assert!(after.matches(&newer));
    }

    #[test]
    fn temporal_filters_skip_folders_and_lmt_less_objects() {
        let cutoff = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let before = BeforeFilter::new(cutoff);
        let folder = StoredObject::folder(RelativePath::parse("d").unwrap(), None);
        assert!(before.matches(&folder));
        assert!(before.matches(&file("unknown-lmt.txt")));
    }

    #[test]
    fn cutoff_parsing_accepts_zoned_and_naive_forms() {
        assert!(parse_cutoff("2024-06-01T12:00:00+02:00").is_ok());
        assert!(parse_cutoff("2024-06-01T12:00:00").is_ok());
        assert!(parse_cutoff("2024-06-01T12:00").is_ok());
        assert!(parse_cutoff("2024-06-01").is_ok());
        assert!(parse_cutoff("June 1st").is_err());
    }

    #[test]
    fn blob_type_exclusion() {
        let filter = BlobTypeFilter::exclude(vec![BlobKind::PageBlob, BlobKind::AppendBlob]);
        let page = file("disk.vhd").with_blob_kind(BlobKind::PageBlob);
        let block = file("doc.txt");
        assert!(filter.matches(&page));
        assert!(!filter.matches(&block));
    }

    #[test]
    fn container_exclusion() {
        let filter = ContainerFilter::exclude(vec!["logs".into()]);
        let in_logs = file("a.txt").with_container("logs");
        let in_data = file("a.txt").with_container("data");
        assert!(filter.matches(&in_logs));
        assert!(!filter.matches(&in_data));
    }
}
