use crate::AppResult;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Result file kept open for the whole run. Lines are only ever appended.
pub struct ResultWriter {
    file: File,
}

impl ResultWriter {
    pub async fn open(file_path: &Path) -> AppResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .await?;
        tracing::debug!(path = %file_path.display(), "Opened result file");
        Ok(ResultWriter { file })
    }

    pub async fn append_line(&mut self, line: &str) -> AppResult<()> {
        let mut buffer = String::with_capacity(line.len() + 1);
        buffer.push_str(line);
        buffer.push('\n');
        self.file.write_all(buffer.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    pub async fn close(mut self) -> AppResult<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_creates_file() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let temp_dir = tempfile::TempDir::with_prefix("result_writer_tests_create")?;
        let result_path = temp_dir.path().join("result.csv");

        let mut writer = ResultWriter::open(&result_path).await?;
        writer.append_line("2023/07/01,Daily,12%,").await?;
        writer.append_line("").await?;
        writer.close().await?;

        let content = tokio::fs::read_to_string(&result_path).await?;
        assert_eq!(content, "2023/07/01,Daily,12%,\n\n");
        Ok(())
    }

    #[tokio::test]
    async fn append_keeps_existing_lines() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let temp_dir = tempfile::TempDir::with_prefix("result_writer_tests_append")?;
        let result_path = temp_dir.path().join("result.csv");
        tokio::fs::write(&result_path, "previous run,\n").await?;

        let mut writer = ResultWriter::open(&result_path).await?;
        writer.append_line("next run,").await?;
        writer.close().await?;

        let content = tokio::fs::read_to_string(&result_path).await?;
        assert_eq!(content, "previous run,\nnext run,\n");
        Ok(())
    }

    #[tokio::test]
    async fn open_fails_for_missing_parent() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let temp_dir = tempfile::TempDir::with_prefix("result_writer_tests_missing")?;
        let result_path = temp_dir.path().join("missing").join("result.csv");
        assert!(ResultWriter::open(&result_path).await.is_err());
        Ok(())
    }
}
