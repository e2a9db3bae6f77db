use crate::file_systems::FileSystemRef;
use rvstruct::ValueStruct;

/// Selects which input files take part in a run.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    pub filename_matcher: Option<globset::GlobMatcher>,
    pub max_size_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileMatcherResult {
    Matched,
    SkippedDueToSize,
    SkippedDueToName,
}

impl FileMatcher {
    pub fn new(
        filename_matcher: Option<globset::GlobMatcher>,
        max_size_limit: Option<u64>,
    ) -> Self {
        FileMatcher {
            filename_matcher,
            max_size_limit,
        }
    }

    pub fn from_args(filename_filter: Option<&globset::Glob>, max_size_limit: Option<u64>) -> Self {
        Self::new(
            filename_filter.map(|filter| filter.compile_matcher()),
            max_size_limit,
        )
    }

    pub fn matches(&self, file_ref: &FileSystemRef) -> FileMatcherResult {
        if let (Some(max_size_limit), Some(file_size)) = (self.max_size_limit, file_ref.file_size)
        {
            if file_size > max_size_limit {
                return FileMatcherResult::SkippedDueToSize;
            }
        }

        if let Some(filename_matcher) = &self.filename_matcher {
            if !filename_matcher.is_match(file_ref.relative_path.value().as_str()) {
                return FileMatcherResult::SkippedDueToName;
            }
        }

        FileMatcherResult::Matched
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use crate::file_systems::*;

    fn screenshot(name: &str, size: u64) -> FileSystemRef {
        FileSystemRef {
            relative_path: RelativeFilePath(name.to_string()),
            media_type: mime_guess::from_path(name).first(),
            file_size: Some(size),
        }
    }

    #[test]
    fn test_file_matcher() {
        let file_matcher = FileMatcher::new(
            Some(globset::Glob::new("Screenshot_*.png").unwrap().compile_matcher()),
            Some(4_000_000),
        );

        assert_eq!(
            file_matcher.matches(&screenshot("Screenshot_20230701.png", 900_000)),
            FileMatcherResult::Matched
        );
        assert_eq!(
            file_matcher.matches(&screenshot("Screenshot_20230702.png", 5_000_000)),
            FileMatcherResult::SkippedDueToSize
        );
        assert_eq!(
            file_matcher.matches(&screenshot("thumbnail.png", 1_000)),
            FileMatcherResult::SkippedDueToName
        );
    }

    #[test]
    fn test_empty_file_matcher() {
        let file_matcher = FileMatcher::from_args(None, None);
        assert_eq!(
            file_matcher.matches(&screenshot("anything.bin", u64::MAX)),
            FileMatcherResult::Matched
        );
    }
}
