//! Argument cooking: raw CLI strings become validated pipeline inputs
//! before any traversal starts.

use std::sync::Arc;

use ferry_core::{
    FerryError, FilterChain, FromTo, HardlinkHandling, JobPartFlags, Location, LocationKind,
    CpkInfo, SymlinkHandling, WildcardSpec,
};
use ferry_tx::{
    AfterFilter, AttributeFilter, BeforeFilter, BlobTypeFilter, ContainerFilter, PathPrefixFilter,
    PatternFilter, RegexFilter,
};

use crate::args::{FilterArgs, RemoveArgs, SyncArgs, TransferArgs};

/// A validated transfer request: endpoints resolved, wildcards cooked,
/// filters built, flags folded into the job-part shape.
#[derive(Debug)]
pub struct Cooked {
    pub source: Location,
    pub dest: Option<Location>,
    pub from_to: FromTo,
    pub wildcard: WildcardSpec,
    pub filters: FilterChain,
    pub flags: JobPartFlags,
    pub dry_run: bool,
}

fn resolve_pair(
    raw_source: &str,
    raw_dest: Option<&str>,
    explicit: Option<&str>,
    removing: bool,
) -> Result<(Location, Option<Location>, FromTo), FerryError> {
    let mut source = Location::parse(raw_source);
    let mut dest = raw_dest.map(Location::parse);

    let from_to = match explicit {
        Some(text) => {
            let from_to: FromTo = text.parse()?;
            source = source.with_kind(from_to.source_kind());
            if let (Some(d), Some(kind)) = (dest.take(), from_to.dest_kind()) {
                dest = Some(d.with_kind(kind));
            }
            from_to
        }
        None => {
            if source.kind() == LocationKind::Unknown {
                return Err(FerryError::UnsupportedEndpoint(format!(
                    "cannot infer the endpoint kind of '{source}'; pass --from-to"
                )));
            }
            match &dest {
                Some(d) if !removing => {
                    if d.kind() == LocationKind::Unknown {
                        return Err(FerryError::UnsupportedEndpoint(format!(
                            "cannot infer the endpoint kind of '{d}'; pass --from-to"
                        )));
                    }
                    FromTo::infer(source.kind(), d.kind())?
                }
                _ => FromTo::infer_remove(source.kind())?,
            }
        }
    };
    Ok((source, dest, from_to))
}

/// Build the filter chain from the common filter flags, optionally seeded
/// with the wildcard pattern stripped off the source path.
pub fn build_filters(
    args: &FilterArgs,
    wildcard: &WildcardSpec,
) -> Result<FilterChain, FerryError> {
    let mut chain = FilterChain::new();
    if let Some(pattern) = &wildcard.pattern {
        // A bare `*` matches everything at the top level; anything else
        // becomes an ordinary name pattern.
        if pattern != "*" {
            chain.push(Arc::new(PatternFilter::include(pattern)?));
        }
    }
    if let Some(arg) = &args.include_pattern {
        chain.push(Arc::new(PatternFilter::include(arg)?));
    }
    if let Some(arg) = &args.exclude_pattern {
        chain.push(Arc::new(PatternFilter::exclude(arg)?));
    }
    if let Some(arg) = &args.include_path {
        chain.push(Arc::new(PathPrefixFilter::include(arg)?));
    }
    if let Some(arg) = &args.exclude_path {
        chain.push(Arc::new(PathPrefixFilter::exclude(arg)?));
    }
    if let Some(arg) = &args.include_regex {
        chain.push(Arc::new(RegexFilter::include(arg)?));
    }
    if let Some(arg) = &args.exclude_regex {
        chain.push(Arc::new(RegexFilter::exclude(arg)?));
    }
    if let Some(arg) = &args.include_before {
        chain.push(Arc::new(BeforeFilter::parse(arg)?));
    }
    if let Some(arg) = &args.include_after {
        chain.push(Arc::new(AfterFilter::parse(arg)?));
    }
    if let Some(arg) = &args.include_attributes {
        chain.push(Arc::new(AttributeFilter::include(arg)?));
    }
    if let Some(arg) = &args.exclude_attributes {
        chain.push(Arc::new(AttributeFilter::exclude(arg)?));
    }
    if let Some(arg) = &args.exclude_blob_type {
        let kinds = arg
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        chain.push(Arc::new(BlobTypeFilter::exclude(kinds)));
    }
    if let Some(arg) = &args.exclude_container {
        let names = arg
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        chain.push(Arc::new(ContainerFilter::exclude(names)));
    }
    Ok(chain)
}

pub fn cook_copy(args: &TransferArgs, cap_mbps: Option<f64>) -> Result<Cooked, FerryError> {
    let (source, dest, from_to) = resolve_pair(
        &args.source,
        Some(&args.destination),
        args.from_to.as_deref(),
        false,
    )?;
    let (source, wildcard) = source.cook_wildcards()?;
    // At an account root the stripped pattern names containers, not
    // objects; the traverser applies it there instead.
    let filters = if source.is_account_root() {
        build_filters(&args.filters, &WildcardSpec::default())?
    } else {
        build_filters(&args.filters, &wildcard)?
    };

    let symlinks = match (args.follow_symlinks, args.preserve_symlinks) {
        (true, _) => SymlinkHandling::Follow,
        (_, true) => SymlinkHandling::Preserve,
        _ => SymlinkHandling::Skip,
    };
    let cpk = if args.cpk_by_value {
        Some(CpkInfo {
            by_name: None,
            by_value: true,
        })
    } else {
        args.cpk_by_name.as_ref().map(|name| CpkInfo {
            by_name: Some(name.clone()),
            by_value: false,
        })
    };

    let flags = JobPartFlags {
        recursive: args.recursive,
        preserve_info: args.preserve_info,
        preserve_permissions: if args.preserve_permissions {
            ferry_core::PreservePermissions::True
        } else {
            ferry_core::PreservePermissions::False
        },
        preserve_posix: args.preserve_posix_properties,
        overwrite: args.overwrite,
        md5_validation: args.check_md5,
        put_md5: args.put_md5,
        cpk,
        symlinks,
        hardlinks: args.hardlinks,
        include_directory_stubs: args.include_directory_stub,
        trailing_dot: args.trailing_dot,
        block_size_mb: args.block_size_mb,
        cap_mbps,
        force_if_read_only: args.force_if_read_only,
        ..Default::default()
    };

    Ok(Cooked {
        source,
        dest,
        from_to,
        wildcard,
        filters,
        flags,
        dry_run: args.dry_run,
    })
}

pub fn cook_sync(args: &SyncArgs, cap_mbps: Option<f64>) -> Result<Cooked, FerryError> {
    let (source, dest, from_to) = resolve_pair(
        &args.source,
        Some(&args.destination),
        args.from_to.as_deref(),
        false,
    )?;
    // Wildcards do not combine with sync: the comparator needs a stable
    // one-to-one mapping between the two roots.
    let (cooked_source, wildcard) = source.cook_wildcards()?;
    if wildcard.strip_top_dir {
        return Err(FerryError::InvalidArgument(
            "wildcards cannot be used with sync".to_string(),
        ));
    }
    let filters = build_filters(&args.filters, &wildcard)?;

    let flags = JobPartFlags {
        recursive: args.recursive,
        preserve_info: args.preserve_info,
        preserve_permissions: if args.preserve_permissions {
            ferry_core::PreservePermissions::True
        } else {
            ferry_core::PreservePermissions::False
        },
        preserve_posix: args.preserve_posix_properties,
        put_md5: args.put_md5,
        symlinks: if args.follow_symlinks {
            SymlinkHandling::Follow
        } else {
            SymlinkHandling::Skip
        },
        hardlinks: HardlinkHandling::Follow,
        delete_destination: args.delete_destination,
        trailing_dot: args.trailing_dot,
        cap_mbps,
        ..Default::default()
    };

    Ok(Cooked {
        source: cooked_source,
        dest,
        from_to,
        wildcard,
        filters,
        flags,
        dry_run: args.dry_run,
    })
}

pub fn cook_remove(args: &RemoveArgs, cap_mbps: Option<f64>) -> Result<Cooked, FerryError> {
    let (source, dest, from_to) =
        resolve_pair(&args.target, None, args.from_to.as_deref(), true)?;
    if !from_to.is_remove() {
        return Err(FerryError::InvalidArgument(format!(
            "--from-to {from_to} is not a remove pair"
        )));
    }
    if args.list_of_versions.is_some() && args.list_of_files.is_some() {
        return Err(FerryError::InvalidArgument(
            "--list-of-files and --list-of-versions cannot be combined".to_string(),
        ));
    }
    let (source, wildcard) = source.cook_wildcards()?;
    let filters = if source.is_account_root() {
        build_filters(&args.filters, &WildcardSpec::default())?
    } else {
        build_filters(&args.filters, &wildcard)?
    };

    let flags = JobPartFlags {
        recursive: args.recursive,
        permanent_delete: args.permanent_delete,
        delete_snapshots: args.delete_snapshots,
        trailing_dot: args.trailing_dot,
        force_if_read_only: args.force_if_read_only,
        cap_mbps,
        ..Default::default()
    };

    Ok(Cooked {
        source,
        dest,
        from_to,
        wildcard,
        filters,
        flags,
        dry_run: args.dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::TransferArgs;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: TransferArgs,
    }

    fn parse(argv: &[&str]) -> TransferArgs {
        let mut full = vec!["harness"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[test]
    fn infers_pair_and_cooks_wildcard() {
        let args = parse(&["https://acct.blob.core.windows.net/c/*", "/tmp/out"]);
        let cooked = cook_copy(&args, None).unwrap();
        assert_eq!(cooked.from_to, FromTo::BlobLocal);
        assert!(cooked.wildcard.strip_top_dir);
        assert_eq!(cooked.source.path(), "https://acct.blob.core.windows.net/c");
    }

    #[test]
    fn escaped_wildcard_is_not_stripped() {
        let args = parse(&["https://acct.blob.core.windows.net/c/%2A", "/tmp/out"]);
        let cooked = cook_copy(&args, None).unwrap();
        assert!(!cooked.wildcard.strip_top_dir);
        assert_eq!(
            cooked.source.path(),
            "https://acct.blob.core.windows.net/c/*"
        );
    }

    #[test]
    fn mid_path_wildcard_is_rejected() {
        let args = parse(&["https://acct.blob.core.windows.net/c/sub*dir/*", "/tmp/out"]);
        let err = cook_copy(&args, None).unwrap_err();
        assert!(matches!(err, FerryError::InvalidArgument(_)));
        assert!(err.to_string().contains("cannot use wildcards"));
    }

    #[test]
    fn unknown_endpoint_requires_from_to() {
        let args = parse(&["https://example.org/data", "/tmp/out"]);
        assert!(matches!(
            cook_copy(&args, None).unwrap_err(),
            FerryError::UnsupportedEndpoint(_)
        ));

        let args = parse(&[
            "https://example.org/data",
            "/tmp/out",
            "--from-to",
            "BlobLocal",
        ]);
        let cooked = cook_copy(&args, None).unwrap();
        assert_eq!(cooked.from_to, FromTo::BlobLocal);
        assert_eq!(cooked.source.kind(), LocationKind::Blob);
    }

    #[test]
    fn trailing_pattern_becomes_an_include_filter() {
        let args = parse(&["https://acct.blob.core.windows.net/c/foo*", "/tmp/out"]);
        let cooked = cook_copy(&args, None).unwrap();
        assert!(cooked.wildcard.strip_top_dir);
        assert_eq!(cooked.filters.len(), 1);
    }
}
