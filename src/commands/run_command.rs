use crate::args::ErrorPolicy;
use crate::cropper::prepare_crop_images;
use crate::crop_regions::CropRegions;
use crate::file_systems::{FileSystemRef, LocalFileSystem};
use crate::file_tools::FileMatcher;
use crate::recognizers::{analyze_image_text, Recognizer, RecognizerOptions, Recognizers};
use crate::reporter::AppReporter;
use crate::result_writer::ResultWriter;
use crate::AppResult;
use console::{Style, Term};
use indicatif::*;
use rvstruct::ValueStruct;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCommandResult {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

#[derive(Debug, Clone)]
pub struct RunCommandOptions {
    pub file_matcher: FileMatcher,
    pub output: PathBuf,
    pub tmp_dir: PathBuf,
    pub regions_config: Option<PathBuf>,
    pub error_policy: ErrorPolicy,
}

impl RunCommandOptions {
    pub fn new(
        filename_filter: Option<globset::Glob>,
        max_size_limit: Option<u64>,
        output: PathBuf,
        tmp_dir: PathBuf,
        regions_config: Option<PathBuf>,
        error_policy: ErrorPolicy,
    ) -> Self {
        RunCommandOptions {
            file_matcher: FileMatcher::from_args(filename_filter.as_ref(), max_size_limit),
            output,
            tmp_dir,
            regions_config,
            error_policy,
        }
    }
}

pub async fn command_run(
    term: &Term,
    input: &str,
    options: RunCommandOptions,
    recognizer_options: RecognizerOptions,
) -> AppResult<RunCommandResult> {
    let bold_style = Style::new().bold();
    let regions = CropRegions::load(options.regions_config.as_deref()).await?;
    term.write_line(
        format!(
            "Recognizing images from {} into {}.\nRecognizer: {}. Crop regions: {}. On error: {}.",
            bold_style.clone().white().apply_to(input),
            bold_style
                .clone()
                .yellow()
                .apply_to(options.output.to_string_lossy()),
            bold_style.clone().green().apply_to(&recognizer_options),
            bold_style.apply_to(regions.len()),
            bold_style.apply_to(options.error_policy),
        )
        .as_str(),
    )?;

    let bar = ProgressBar::new(1);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} images ({eta}) {msg}",
        )?
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("◉>◯"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    let app_reporter = AppReporter::from(&bar);

    let source_fs = LocalFileSystem::new(input, &app_reporter).await?;
    let recognizer = Recognizers::new_recognizer(&recognizer_options, &app_reporter).await?;
    let mut writer = ResultWriter::open(&options.output).await?;

    let list_files_result = source_fs.list_files(Some(&options.file_matcher)).await?;
    bar.println(
        format!(
            "Found {} images.",
            bold_style.apply_to(list_files_result.files.len())
        )
        .as_str(),
    );
    bar.set_length(list_files_result.files.len() as u64);

    let run_result = process_files(
        &bar,
        &source_fs,
        &list_files_result.files,
        &regions,
        &recognizer,
        &mut writer,
        &options,
    )
    .await;

    bar.finish_and_clear();
    writer.close().await?;
    run_result.map(|result| RunCommandResult {
        files_skipped: result.files_skipped + list_files_result.skipped,
        ..result
    })
}

/// Crops, recognizes and appends a line for every file in order.
///
/// Under [`ErrorPolicy::Abort`] the first failing image ends the run before its
/// line is written. Under [`ErrorPolicy::Skip`] it is reported and counted. Failures writing the result file always end the run.
pub async fn process_files(
    bar: &ProgressBar,
    source_fs: &LocalFileSystem<'_>,
    files: &[FileSystemRef],
    regions: &CropRegions,
    recognizer: &impl Recognizer,
    writer: &mut ResultWriter,
    options: &RunCommandOptions,
) -> AppResult<RunCommandResult> {
    let reporter = AppReporter::from(bar);
    let mut result = RunCommandResult::default();

    for file_ref in files {
        let file_path = source_fs.resolve(file_ref);
        bar.set_message(file_ref.relative_path.value().clone());
        match process_file(&file_path, regions, recognizer, &options.tmp_dir).await {
            Ok(line) => {
                writer.append_line(&line).await?;
                tracing::info!(
                    file = %file_path.display(),
                    line = line.as_str(),
                    "Appended recognized line"
                );
                result.files_processed += 1;
            }
            Err(error) => match options.error_policy {
                // Reported once by the caller.
                ErrorPolicy::Abort => return Err(error),
                ErrorPolicy::Skip => {
                    reporter.report_image_failure(&file_path, &error)?;
                    result.files_failed += 1;
                }
            },
        }
        bar.inc(1);
    }
    Ok(result)
}

async fn process_file(
    file_path: &Path,
    regions: &CropRegions,
    recognizer: &impl Recognizer,
    tmp_dir: &Path,
) -> AppResult<String> {
    let crop_artifacts = prepare_crop_images(file_path, regions, tmp_dir).await?;
    analyze_image_text(recognizer, &crop_artifacts).await
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use crate::crop_regions::CropRegion;
    use crate::errors::AppError;
    use crate::recognizers::{RecognizedDocument, RecognizedParagraph, RecognizerImage};
    use image::{GenericImageView, Rgb, RgbImage};

    /// Reads back the red channel of the crop's first pixel as its text.
    struct PixelValueRecognizer;

    impl Recognizer for PixelValueRecognizer {
        async fn detect_document_text(
            &self,
            image: RecognizerImage,
        ) -> AppResult<RecognizedDocument> {
            let crop = image::load_from_memory(&image.data)?;
            let value = crop.get_pixel(0, 0).0[0];
            Ok(RecognizedDocument::from_paragraphs(vec![
                RecognizedParagraph::from_text(&value.to_string()),
            ]))
        }
    }

    struct FailingRecognizer;

    impl Recognizer for FailingRecognizer {
        async fn detect_document_text(
            &self,
            image: RecognizerImage,
        ) -> AppResult<RecognizedDocument> {
            Err(AppError::RecognitionError {
                file_path: image.file_path,
                message: "quota exceeded".to_string(),
            })
        }
    }

    /// Terminal that keeps everything drawn by a progress bar.
    #[derive(Debug, Clone, Default)]
    struct CapturedTerm {
        output: std::sync::Arc<std::sync::Mutex<String>>,
    }

    impl CapturedTerm {
        fn progress_bar(&self) -> ProgressBar {
            ProgressBar::with_draw_target(
                None,
                ProgressDrawTarget::term_like(Box::new(self.clone())),
            )
        }

        fn output(&self) -> String {
            self.output.lock().unwrap().clone()
        }
    }

    impl TermLike for CapturedTerm {
        fn width(&self) -> u16 {
            400
        }

        fn move_cursor_up(&self, _n: usize) -> std::io::Result<()> {
            Ok(())
        }

        fn move_cursor_down(&self, _n: usize) -> std::io::Result<()> {
            Ok(())
        }

        fn move_cursor_right(&self, _n: usize) -> std::io::Result<()> {
            Ok(())
        }

        fn move_cursor_left(&self, _n: usize) -> std::io::Result<()> {
            Ok(())
        }

        fn write_line(&self, s: &str) -> std::io::Result<()> {
            self.write_str(s)?;
            self.write_str("\n")
        }

        fn write_str(&self, s: &str) -> std::io::Result<()> {
            self.output.lock().unwrap().push_str(s);
            Ok(())
        }

        fn clear_line(&self) -> std::io::Result<()> {
            Ok(())
        }

        fn flush(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn test_regions() -> CropRegions {
        CropRegions {
            regions: vec![
                CropRegion::new("date", 0, 0, 10, 10),
                CropRegion::new("type", 10, 0, 10, 10),
                CropRegion::new("u_percent", 20, 0, 10, 10),
            ],
        }
    }

    /// Screenshot whose three regions are filled with `base`, `base + 1` and `base + 2`.
    fn write_screenshot(path: &Path, base: u8) -> Result<(), image::ImageError> {
        RgbImage::from_fn(30, 10, |x, _| {
            let value = base + (x / 10) as u8;
            Rgb([value, value, value])
        })
        .save(path)
    }

    struct TestRun {
        temp_dir: tempfile::TempDir,
        input_dir: PathBuf,
        output: PathBuf,
    }

    impl TestRun {
        fn new(prefix: &str) -> Result<Self, std::io::Error> {
            let temp_dir = tempfile::TempDir::with_prefix(prefix)?;
            let input_dir = temp_dir.path().join("img");
            std::fs::create_dir(&input_dir)?;
            let output = temp_dir.path().join("result.csv");
            Ok(TestRun {
                temp_dir,
                input_dir,
                output,
            })
        }

        fn options(&self, error_policy: ErrorPolicy) -> RunCommandOptions {
            RunCommandOptions::new(
                None,
                None,
                self.output.clone(),
                self.temp_dir.path().join("tmp"),
                None,
                error_policy,
            )
        }

        async fn run(
            &self,
            recognizer: &impl Recognizer,
            error_policy: ErrorPolicy,
        ) -> AppResult<RunCommandResult> {
            self.run_with_bar(&ProgressBar::hidden(), recognizer, error_policy)
                .await
        }

        async fn run_with_bar(
            &self,
            bar: &ProgressBar,
            recognizer: &impl Recognizer,
            error_policy: ErrorPolicy,
        ) -> AppResult<RunCommandResult> {
            let term = Term::stdout();
            let reporter = AppReporter::from(&term);
            let source_fs =
                LocalFileSystem::new(&self.input_dir.to_string_lossy(), &reporter).await?;
            let options = self.options(error_policy);
            let files = source_fs.list_files(Some(&options.file_matcher)).await?;
            let mut writer = ResultWriter::open(&self.output).await?;
            let result = process_files(
                bar,
                &source_fs,
                &files.files,
                &test_regions(),
                recognizer,
                &mut writer,
                &options,
            )
            .await;
            writer.close().await?;
            result
        }

        async fn result_lines(&self) -> Result<Vec<String>, std::io::Error> {
            Ok(tokio::fs::read_to_string(&self.output)
                .await?
                .lines()
                .map(|line| line.to_string())
                .collect())
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_image_in_order(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_order")?;
        write_screenshot(&test_run.input_dir.join("b.png"), 20)?;
        write_screenshot(&test_run.input_dir.join("a.png"), 10)?;
        write_screenshot(&test_run.input_dir.join("c.png"), 30)?;

        let result = test_run
            .run(&PixelValueRecognizer, ErrorPolicy::Abort)
            .await?;

        assert_eq!(result.files_processed, 3);
        assert_eq!(
            test_run.result_lines().await?,
            vec!["10,11,12,", "20,21,22,", "30,31,32,"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn rerun_appends_again() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_rerun")?;
        write_screenshot(&test_run.input_dir.join("a.png"), 40)?;
        write_screenshot(&test_run.input_dir.join("b.png"), 50)?;

        test_run
            .run(&PixelValueRecognizer, ErrorPolicy::Abort)
            .await?;
        test_run
            .run(&PixelValueRecognizer, ErrorPolicy::Abort)
            .await?;

        assert_eq!(
            test_run.result_lines().await?,
            vec!["40,41,42,", "50,51,52,", "40,41,42,", "50,51,52,"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_leaves_result_untouched(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_empty")?;
        tokio::fs::write(&test_run.output, "earlier,\n").await?;

        let result = test_run
            .run(&PixelValueRecognizer, ErrorPolicy::Abort)
            .await?;

        assert_eq!(result, RunCommandResult::default());
        assert_eq!(
            tokio::fs::read_to_string(&test_run.output).await?,
            "earlier,\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn abort_stops_at_first_failing_image(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_abort")?;
        write_screenshot(&test_run.input_dir.join("a.png"), 10)?;
        tokio::fs::write(test_run.input_dir.join("b.png"), b"corrupt").await?;
        write_screenshot(&test_run.input_dir.join("c.png"), 30)?;

        let result = test_run
            .run(&PixelValueRecognizer, ErrorPolicy::Abort)
            .await;

        assert!(matches!(result, Err(AppError::ImageError(_))));
        assert_eq!(test_run.result_lines().await?, vec!["10,11,12,"]);
        Ok(())
    }

    #[tokio::test]
    async fn skip_continues_after_failing_image(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_skip")?;
        write_screenshot(&test_run.input_dir.join("a.png"), 10)?;
        tokio::fs::write(test_run.input_dir.join("b.png"), b"corrupt").await?;
        write_screenshot(&test_run.input_dir.join("c.png"), 30)?;

        let result = test_run
            .run(&PixelValueRecognizer, ErrorPolicy::Skip)
            .await?;

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.files_failed, 1);
        assert_eq!(
            test_run.result_lines().await?,
            vec!["10,11,12,", "30,31,32,"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn recognition_failure_writes_nothing(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_recognition")?;
        write_screenshot(&test_run.input_dir.join("a.png"), 10)?;
        write_screenshot(&test_run.input_dir.join("b.png"), 20)?;

        let result = test_run.run(&FailingRecognizer, ErrorPolicy::Abort).await;

        assert!(matches!(result, Err(AppError::RecognitionError { .. })));
        assert!(test_run.result_lines().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn abort_leaves_failure_reporting_to_caller(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_abort_report")?;
        write_screenshot(&test_run.input_dir.join("a.png"), 10)?;
        let term = CapturedTerm::default();

        let result = test_run
            .run_with_bar(&term.progress_bar(), &FailingRecognizer, ErrorPolicy::Abort)
            .await;

        assert!(matches!(result, Err(AppError::RecognitionError { .. })));
        assert!(!term.output().contains("quota exceeded"));
        Ok(())
    }

    #[tokio::test]
    async fn skip_reports_each_failing_image(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_run = TestRun::new("run_command_tests_skip_report")?;
        write_screenshot(&test_run.input_dir.join("a.png"), 10)?;
        write_screenshot(&test_run.input_dir.join("b.png"), 20)?;
        let term = CapturedTerm::default();

        let result = test_run
            .run_with_bar(&term.progress_bar(), &FailingRecognizer, ErrorPolicy::Skip)
            .await?;

        assert_eq!(result.files_failed, 2);
        let output = term.output();
        assert_eq!(output.matches("quota exceeded").count(), 2);
        assert!(output.contains("a.png"));
        assert!(output.contains("b.png"));
        Ok(())
    }
}
