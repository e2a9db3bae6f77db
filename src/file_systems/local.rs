use crate::errors::AppError;
use crate::file_systems::{FileSystemRef, ListFilesResult};
use crate::file_tools::{FileMatcher, FileMatcherResult};
use crate::reporter::AppReporter;
use crate::AppResult;
use rvstruct::ValueStruct;
use std::path::PathBuf;

/// Input images directory. Only its direct children are processed.
pub struct LocalFileSystem<'a> {
    root_path: PathBuf,
    reporter: &'a AppReporter<'a>,
}

impl<'a> LocalFileSystem<'a> {
    pub async fn new(root_path: &str, reporter: &'a AppReporter<'a>) -> AppResult<Self> {
        let root_path = PathBuf::from(root_path.trim_start_matches("file://"));
        match tokio::fs::metadata(&root_path).await {
            Ok(metadata) if metadata.is_dir() => Ok(LocalFileSystem {
                root_path,
                reporter,
            }),
            _ => Err(AppError::InputDirectoryNotFound {
                input_dir: root_path.to_string_lossy().to_string(),
            }),
        }
    }

    /// Lists regular files sorted by name. Directories and files rejected by
    /// `file_matcher` are counted as skipped.
    pub async fn list_files(
        &self,
        file_matcher: Option<&FileMatcher>,
    ) -> AppResult<ListFilesResult> {
        self.reporter.report(format!(
            "Listing files in dir: {}",
            self.root_path.to_string_lossy()
        ))?;
        let mut entries = tokio::fs::read_dir(&self.root_path).await?;
        let mut files = Vec::new();
        let mut skipped: usize = 0;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                skipped += 1;
                continue;
            }
            let file_ref = FileSystemRef {
                relative_path: entry.file_name().to_string_lossy().to_string().into(),
                media_type: mime_guess::from_path(entry.path()).first(),
                file_size: Some(entry.metadata().await?.len()),
            };
            if file_matcher
                .iter()
                .all(|matcher| matches!(matcher.matches(&file_ref), FileMatcherResult::Matched))
            {
                files.push(file_ref);
            } else {
                skipped += 1;
            }
        }
        files.sort_by(|a, b| a.relative_path.value().cmp(b.relative_path.value()));
        Ok(ListFilesResult { files, skipped })
    }

    pub fn resolve(&self, file_ref: &FileSystemRef) -> PathBuf {
        self.root_path.join(file_ref.relative_path.value())
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use console::Term;

    #[tokio::test]
    async fn list_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let temp_dir = tempfile::TempDir::with_prefix("local_file_system_tests_list")?;
        let temp_dir_path = temp_dir.path();
        for name in ["c.png", "a.png", "b.jpg"] {
            tokio::fs::write(temp_dir_path.join(name), b"content").await?;
        }
        tokio::fs::create_dir(temp_dir_path.join("nested")).await?;

        let fs = LocalFileSystem::new(&temp_dir_path.to_string_lossy(), &reporter).await?;
        let list_files_result = fs.list_files(None).await?;

        assert_eq!(
            list_files_result
                .files
                .iter()
                .map(|f| f.relative_path.value().as_str())
                .collect::<Vec<_>>(),
            vec!["a.png", "b.jpg", "c.png"]
        );
        assert_eq!(list_files_result.skipped, 1);
        assert_eq!(list_files_result.files[0].media_type, Some(mime::IMAGE_PNG));
        assert_eq!(list_files_result.files[1].media_type, Some(mime::IMAGE_JPEG));
        assert_eq!(list_files_result.files[0].file_size, Some(7));
        assert_eq!(
            fs.resolve(&list_files_result.files[2]),
            temp_dir_path.join("c.png")
        );
        Ok(())
    }

    #[tokio::test]
    async fn list_with_matcher_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let temp_dir = tempfile::TempDir::with_prefix("local_file_system_tests_matcher")?;
        for name in ["shot1.png", "shot2.png", "notes.txt"] {
            tokio::fs::write(temp_dir.path().join(name), b"content").await?;
        }
        let fs = LocalFileSystem::new(
            &format!("file://{}", temp_dir.path().to_string_lossy()),
            &reporter,
        )
        .await?;
        let matcher = FileMatcher::new(
            Some(globset::Glob::new("*.png")?.compile_matcher()),
            None,
        );
        let list_files_result = fs.list_files(Some(&matcher)).await?;
        assert_eq!(list_files_result.files.len(), 2);
        assert_eq!(list_files_result.skipped, 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_dir_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let temp_dir = tempfile::TempDir::with_prefix("local_file_system_tests_missing")?;
        let missing = temp_dir.path().join("img");
        let result = LocalFileSystem::new(&missing.to_string_lossy(), &reporter).await;
        assert!(matches!(
            result,
            Err(AppError::InputDirectoryNotFound { .. })
        ));
        Ok(())
    }
}
