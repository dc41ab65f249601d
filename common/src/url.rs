//! Endpoint parsing and pre-sync validation.
//!
//! An endpoint is either a local directory or an `s3://bucket[/prefix]`
//! location, optionally carrying a wildcard (`*`, `?`) in the key part.

use anyhow::{anyhow, Context, Result};

const S3_SCHEME: &str = "s3://";

#[derive(Debug, Clone)]
pub enum Endpoint {
    Local(LocalEndpoint),
    Remote(RemoteEndpoint),
}

#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    pub root: std::path::PathBuf,
    raw: String,
}

#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    pub bucket: String,
    /// Key prefix up to the first wildcard; doubles as the listing prefix
    /// and the base that relative keys are taken against.
    pub prefix: String,
    pattern: Option<globset::GlobMatcher>,
    raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Bucket,
    Prefix,
    WildcardPrefix,
    SingleObject,
    LocalDir,
    LocalFile,
}

pub fn parse(input: &str) -> Result<Endpoint> {
    if let Some(rest) = input.strip_prefix(S3_SCHEME) {
        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(anyhow!("url {:?} is missing a bucket name", input));
        }
        if bucket.contains(['*', '?']) {
            return Err(anyhow!("bucket name {:?} cannot contain wildcards", bucket));
        }
        let (prefix, pattern) = if key.contains(['*', '?']) {
            let wildcard_at = key.find(['*', '?']).unwrap();
            let prefix = match key[..wildcard_at].rfind('/') {
                Some(slash_at) => &key[..=slash_at],
                None => "",
            };
            let glob = globset::Glob::new(key)
                .with_context(|| format!("invalid wildcard expression {:?}", key))?;
            (prefix.to_string(), Some(glob.compile_matcher()))
        } else {
            (key.to_string(), None)
        };
        Ok(Endpoint::Remote(RemoteEndpoint {
            bucket: bucket.to_string(),
            prefix,
            pattern,
            raw: input.to_string(),
        }))
    } else {
        Ok(Endpoint::Local(LocalEndpoint {
            root: std::path::PathBuf::from(input),
            raw: input.to_string(),
        }))
    }
}

impl LocalEndpoint {
    /// Filesystem path of the object at `key`, keys always use `/`.
    pub fn path_of(&self, key: &str) -> std::path::PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }

    pub fn join_display(&self, key: &str) -> String {
        format!("{}/{}", self.raw.trim_end_matches('/'), key)
    }
}

impl RemoteEndpoint {
    pub fn kind(&self) -> EndpointKind {
        if self.pattern.is_some() {
            EndpointKind::WildcardPrefix
        } else if self.prefix.is_empty() {
            EndpointKind::Bucket
        } else if self.prefix.ends_with('/') {
            EndpointKind::Prefix
        } else {
            EndpointKind::SingleObject
        }
    }

    /// Whether a listed key survives wildcard expansion.
    pub fn key_matches(&self, key: &str) -> bool {
        match &self.pattern {
            Some(matcher) => matcher.is_match(key),
            None => true,
        }
    }

    pub fn relative_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
            .filter(|rel| !rel.is_empty())
    }

    pub fn absolute_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn join_display(&self, key: &str) -> String {
        format!("{}{}/{}{}", S3_SCHEME, self.bucket, self.prefix, key)
    }
}

impl Endpoint {
    pub fn is_local(&self) -> bool {
        matches!(self, Endpoint::Local(_))
    }

    pub fn raw(&self) -> &str {
        match self {
            Endpoint::Local(local) => &local.raw,
            Endpoint::Remote(remote) => &remote.raw,
        }
    }

    /// Display form of the object at `key`, as printed in operation lines.
    pub fn join_display(&self, key: &str) -> String {
        match self {
            Endpoint::Local(local) => local.join_display(key),
            Endpoint::Remote(remote) => remote.join_display(key),
        }
    }

    pub fn display_root(&self) -> String {
        self.join_display("")
    }
}

/// Startup validation of a source/destination pair; error messages are part
/// of the observable interface and surface once on stderr.
pub fn validate_sync_pair(src: &Endpoint, dst: &Endpoint) -> Result<()> {
    if src.is_local() && dst.is_local() {
        return Err(anyhow!("local->local sync operations are not permitted"));
    }
    match src {
        Endpoint::Local(local) => {
            let metadata = std::fs::metadata(&local.root)
                .with_context(|| format!("cannot read source {:?}", local.root))?;
            if !metadata.is_dir() {
                return Err(anyhow!("local source must be a directory"));
            }
        }
        Endpoint::Remote(remote) => {
            if remote.kind() == EndpointKind::SingleObject {
                return Err(anyhow!(
                    "remote source {:?} must be a bucket or a prefix",
                    remote.raw
                ));
            }
        }
    }
    match dst {
        Endpoint::Local(local) => {
            if let Ok(metadata) = std::fs::metadata(&local.root) {
                if !metadata.is_dir() {
                    return Err(anyhow!("local destination must be a directory"));
                }
            }
        }
        Endpoint::Remote(remote) => {
            if matches!(
                remote.kind(),
                EndpointKind::SingleObject | EndpointKind::WildcardPrefix
            ) {
                return Err(anyhow!(
                    "remote destination {:?} must be a bucket or a prefix",
                    remote.raw
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(input: &str) -> RemoteEndpoint {
        match parse(input).unwrap() {
            Endpoint::Remote(remote) => remote,
            Endpoint::Local(_) => panic!("expected a remote endpoint for {:?}", input),
        }
    }

    #[test]
    fn classifies_remote_endpoints() {
        assert_eq!(remote("s3://bucket").kind(), EndpointKind::Bucket);
        assert_eq!(remote("s3://bucket/").kind(), EndpointKind::Bucket);
        assert_eq!(remote("s3://bucket/abc/").kind(), EndpointKind::Prefix);
        assert_eq!(remote("s3://bucket/*").kind(), EndpointKind::WildcardPrefix);
        assert_eq!(
            remote("s3://bucket/abc/*.txt").kind(),
            EndpointKind::WildcardPrefix
        );
        assert_eq!(
            remote("s3://bucket/file.txt").kind(),
            EndpointKind::SingleObject
        );
    }

    #[test]
    fn local_paths_parse_as_local() {
        assert!(parse("/tmp/dir/").unwrap().is_local());
        assert!(parse("relative/dir").unwrap().is_local());
        assert!(!parse("s3://bucket/").unwrap().is_local());
    }

    #[test]
    fn rejects_empty_and_wildcard_bucket_names() {
        assert!(parse("s3://").is_err());
        assert!(parse("s3:///key").is_err());
        assert!(parse("s3://buck*t/key").is_err());
    }

    #[test]
    fn wildcard_listing_prefix_stops_before_the_wildcard() {
        let endpoint = remote("s3://bucket/abc/def*.txt");
        assert_eq!(endpoint.prefix, "abc/");
        assert!(endpoint.key_matches("abc/def-1.txt"));
        assert!(!endpoint.key_matches("abc/xyz.txt"));

        let bare = remote("s3://bucket/*");
        assert_eq!(bare.prefix, "");
        // a bare star crosses directory boundaries
        assert!(bare.key_matches("abc/def/test.py"));
    }

    #[test]
    fn relative_keys_exclude_the_prefix() {
        let endpoint = remote("s3://bucket/abc/");
        assert_eq!(endpoint.relative_key("abc/def/x.txt"), Some("def/x.txt"));
        assert_eq!(endpoint.relative_key("abc/"), None);
    }

    #[test]
    fn display_joins_root_and_key() {
        assert_eq!(
            parse("/tmp/dir/").unwrap().join_display("a/x.txt"),
            "/tmp/dir/a/x.txt"
        );
        assert_eq!(
            parse("/tmp/dir").unwrap().join_display("a/x.txt"),
            "/tmp/dir/a/x.txt"
        );
        assert_eq!(
            parse("s3://bucket/").unwrap().join_display("a/x.txt"),
            "s3://bucket/a/x.txt"
        );
        assert_eq!(
            parse("s3://bucket/*").unwrap().join_display("a/x.txt"),
            "s3://bucket/a/x.txt"
        );
        assert_eq!(
            parse("s3://bucket/pre/").unwrap().join_display("x.txt"),
            "s3://bucket/pre/x.txt"
        );
    }

    #[test]
    fn local_to_local_pairs_are_rejected() {
        let tmp = std::env::temp_dir();
        let src = parse(tmp.to_str().unwrap()).unwrap();
        let dst = parse(tmp.to_str().unwrap()).unwrap();
        let error = validate_sync_pair(&src, &dst).unwrap_err();
        assert_eq!(
            format!("{}", error),
            "local->local sync operations are not permitted"
        );
    }

    #[test]
    fn local_file_source_is_rejected() {
        let file = std::env::temp_dir().join("rmir_url_test_source.txt");
        std::fs::write(&file, "content").unwrap();
        let src = parse(file.to_str().unwrap()).unwrap();
        let dst = parse("s3://bucket/").unwrap();
        let error = validate_sync_pair(&src, &dst).unwrap_err();
        assert_eq!(format!("{}", error), "local source must be a directory");
        std::fs::remove_file(&file).unwrap();
    }

    #[test]
    fn remote_single_object_source_is_rejected() {
        let src = parse("s3://bucket/key.txt").unwrap();
        let dst = parse(std::env::temp_dir().to_str().unwrap()).unwrap();
        let error = validate_sync_pair(&src, &dst).unwrap_err();
        assert_eq!(
            format!("{}", error),
            "remote source \"s3://bucket/key.txt\" must be a bucket or a prefix"
        );
    }

    #[test]
    fn remote_single_object_destination_is_rejected() {
        let src = parse(std::env::temp_dir().to_str().unwrap()).unwrap();
        let dst = parse("s3://bucket/key.txt").unwrap();
        assert!(validate_sync_pair(&src, &dst).is_err());
    }
}
