use crate::errors::AppError;
use crate::AppResult;
use console::{Style, Term};
use indicatif::ProgressBar;
use std::error::Error;
use std::path::Path;

/// Sink for user facing progress messages.
///
/// While a batch is running messages go through the progress bar so they don't
/// break its rendering; otherwise they are written straight to the terminal.
/// Every message is mirrored to the debug log.
#[derive(Debug, Clone)]
pub struct AppReporter<'a> {
    target: ReportTarget<'a>,
}

#[derive(Debug, Clone)]
enum ReportTarget<'a> {
    Term(&'a Term),
    ProgressBar(&'a ProgressBar),
}

impl AppReporter<'_> {
    pub fn report<S>(&self, message: S) -> AppResult<()>
    where
        S: AsRef<str>,
    {
        let message = message.as_ref();
        tracing::debug!("{}", message);
        match self.target {
            ReportTarget::Term(term) => term.write_line(message)?,
            ReportTarget::ProgressBar(bar) => bar.println(message),
        }
        Ok(())
    }

    /// Reports an image that failed and was left out of the result file.
    pub fn report_image_failure(&self, file_path: &Path, error: &AppError) -> AppResult<()> {
        tracing::warn!(file = %file_path.display(), %error, "Image skipped");
        self.report(image_failure_message(file_path, error))
    }
}

fn image_failure_message(file_path: &Path, error: &AppError) -> String {
    let bold_style = Style::new().bold().white();
    let mut message = format!(
        "{} {}: {}",
        bold_style.clone().red().apply_to("Skipped"),
        bold_style.apply_to(file_path.display()),
        error
    );
    if let Some(source) = error.source() {
        message.push_str(&format!("\n  caused by: {}", source));
    }
    message
}

impl<'a> From<&'a Term> for AppReporter<'a> {
    fn from(term: &'a Term) -> Self {
        AppReporter {
            target: ReportTarget::Term(term),
        }
    }
}

impl<'a> From<&'a ProgressBar> for AppReporter<'a> {
    fn from(bar: &'a ProgressBar) -> Self {
        AppReporter {
            target: ReportTarget::ProgressBar(bar),
        }
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_file_and_error() {
        console::set_colors_enabled(false);
        let error = AppError::RecognitionError {
            file_path: "tmp/date.png".to_string(),
            message: "quota exceeded".to_string(),
        };
        assert_eq!(
            image_failure_message(Path::new("img/shot.png"), &error),
            "Skipped img/shot.png: Text recognition error for tmp/date.png: quota exceeded"
        );
    }

    #[test]
    fn failure_message_includes_source() {
        console::set_colors_enabled(false);
        let error = AppError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let message = image_failure_message(Path::new("img/shot.png"), &error);
        assert!(message.starts_with("Skipped img/shot.png: "));
        assert!(message.ends_with("\n  caused by: denied"));
    }

    #[test]
    fn report_to_hidden_bar() -> AppResult<()> {
        let bar = ProgressBar::hidden();
        AppReporter::from(&bar).report("Found 3 images.")
    }
}
