use crate::errors::AppError;
use crate::recognizers::{
    RecognizedDocument, RecognizedParagraph, RecognizedSymbol, RecognizedWord, Recognizer,
    RecognizerImage,
};
use crate::reporter::AppReporter;
use crate::AppResult;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, OcrInput, TextItem};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OcrsRecognizerOptions {
    pub models_dir: Option<PathBuf>,
}

/// Recognizes text locally with the `ocrs` detection and recognition models.
#[derive(Clone)]
pub struct OcrsRecognizer {
    ocr_engine: std::sync::Arc<OcrEngine>,
}

fn ocr_error<E: std::fmt::Display>(err: E) -> AppError {
    AppError::OcrEngineError {
        message: err.to_string(),
    }
}

impl OcrsRecognizer {
    pub fn new(options: OcrsRecognizerOptions, reporter: &AppReporter<'_>) -> AppResult<Self> {
        let models_dir = match options.models_dir {
            Some(models_dir) => models_dir,
            None => Self::find_models_dir()?,
        };
        reporter.report(format!(
            "Loading OCR models from {}",
            models_dir.to_string_lossy()
        ))?;
        let detection_model =
            rten::Model::load_file(models_dir.join("text-detection.rten")).map_err(ocr_error)?;
        let recognition_model =
            rten::Model::load_file(models_dir.join("text-recognition.rten")).map_err(ocr_error)?;
        let ocr_engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(ocr_error)?;
        Ok(Self {
            ocr_engine: std::sync::Arc::new(ocr_engine),
        })
    }

    fn find_models_dir() -> AppResult<PathBuf> {
        let executable = std::env::current_exe()?;
        let current_dir = executable.parent().map(|p| p.to_path_buf());

        [
            current_dir.clone().map(|p| p.join("models").join("ocrs")),
            current_dir.and_then(|p| p.parent().map(|p| p.join("share").join("ocrs"))),
            dirs::home_dir().map(|p| p.join(".cache").join("ocrs")),
        ]
        .into_iter()
        .flatten()
        .find(|p| p.exists())
        .ok_or_else(|| AppError::RecognizerConfigError {
            message: "Could not find ocrs models directory".to_string(),
        })
    }
}

/// Splits a recognized text line into whitespace separated words of single character symbols.
fn paragraph_from_chars<I>(chars: I) -> RecognizedParagraph
where
    I: IntoIterator<Item = char>,
{
    let mut words = vec![];
    let mut current_word = RecognizedWord::default();
    for c in chars {
        if c.is_whitespace() {
            if !current_word.symbols.is_empty() {
                words.push(std::mem::take(&mut current_word));
            }
        } else {
            current_word.symbols.push(RecognizedSymbol {
                text: c.to_string(),
                confidence: None,
            });
        }
    }
    if !current_word.symbols.is_empty() {
        words.push(current_word);
    }
    RecognizedParagraph { words }
}

impl Recognizer for OcrsRecognizer {
    async fn detect_document_text(&self, image: RecognizerImage) -> AppResult<RecognizedDocument> {
        let rgb_image = image::load_from_memory(&image.data)?.to_rgb8();
        let image_source = ImageSource::from_bytes(rgb_image.as_raw(), rgb_image.dimensions())
            .map_err(ocr_error)?;
        let input: OcrInput = self
            .ocr_engine
            .prepare_input(image_source)
            .map_err(ocr_error)?;
        let word_rects = self.ocr_engine.detect_words(&input).map_err(ocr_error)?;
        let line_rects = self.ocr_engine.find_text_lines(&input, &word_rects);

        let paragraphs: Vec<RecognizedParagraph> = self
            .ocr_engine
            .recognize_text(&input, &line_rects)
            .map_err(ocr_error)?
            .into_iter()
            .flatten()
            .map(|text_line| {
                paragraph_from_chars(text_line.chars().iter().map(|text_char| text_char.char))
            })
            .collect();
        tracing::debug!(
            file_path = image.file_path.as_str(),
            lines = paragraphs.len(),
            "Recognized text lines with ocrs"
        );
        Ok(RecognizedDocument::from_paragraphs(paragraphs))
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use console::Term;

    #[test]
    fn split_text_line_into_words() {
        let paragraph = paragraph_from_chars("  3h 12m\t45% ".chars());
        assert_eq!(
            paragraph
                .words
                .iter()
                .map(RecognizedWord::to_text)
                .collect::<Vec<_>>(),
            vec!["3h", "12m", "45%"]
        );
        assert!(paragraph.words[0]
            .symbols
            .iter()
            .all(|symbol| symbol.text.chars().count() == 1 && symbol.confidence.is_none()));
        assert!(paragraph_from_chars(" \t".chars()).words.is_empty());
    }

    #[tokio::test]
    #[cfg_attr(not(feature = "ci-ocr"), ignore)]
    async fn recognize_png_file() -> AppResult<()> {
        let term = Term::stdout();
        let reporter = AppReporter::from(&term);
        let recognizer = OcrsRecognizer::new(OcrsRecognizerOptions { models_dir: None }, &reporter)?;
        let data = tokio::fs::read("test-fixtures/media/text-sample.png").await?;
        let document = recognizer
            .detect_document_text(RecognizerImage {
                file_path: "test-fixtures/media/text-sample.png".to_string(),
                mime_type: mime::IMAGE_PNG,
                data: data.into(),
            })
            .await?;
        assert!(document.to_flat_text().contains(','));
        Ok(())
    }
}
