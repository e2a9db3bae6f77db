use crate::common_types::CropArtifact;
use crate::AppResult;
use bytes::Bytes;
use mime::Mime;
use rvstruct::ValueStruct;
use std::fmt::Display;

use crate::reporter::AppReporter;

mod gcp_vision;
pub use gcp_vision::*;

#[cfg(feature = "ocr")]
mod local_ocrs;
#[cfg(feature = "ocr")]
pub use local_ocrs::*;

/// Encoded image submitted for recognition.
#[derive(Debug, Clone)]
pub struct RecognizerImage {
    pub file_path: String,
    pub mime_type: Mime,
    pub data: Bytes,
}

/// Text layout returned by document text detection: pages → blocks → paragraphs → words → symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedDocument {
    pub pages: Vec<RecognizedPage>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedPage {
    pub blocks: Vec<RecognizedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedBlock {
    pub paragraphs: Vec<RecognizedParagraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedParagraph {
    pub words: Vec<RecognizedWord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedWord {
    pub symbols: Vec<RecognizedSymbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSymbol {
    pub text: String,
    pub confidence: Option<f32>,
}

impl RecognizedDocument {
    /// Single page, single block document with one paragraph per entry of `paragraphs`.
    pub fn from_paragraphs(paragraphs: Vec<RecognizedParagraph>) -> Self {
        RecognizedDocument {
            pages: vec![RecognizedPage {
                blocks: vec![RecognizedBlock { paragraphs }],
            }],
        }
    }

    /// Lowest symbol confidence, if the provider reports any.
    pub fn min_confidence(&self) -> Option<f32> {
        self.pages
            .iter()
            .flat_map(|page| page.blocks.iter())
            .flat_map(|block| block.paragraphs.iter())
            .flat_map(|paragraph| paragraph.words.iter())
            .flat_map(|word| word.symbols.iter())
            .filter_map(|symbol| symbol.confidence)
            .reduce(f32::min)
    }

    /// Joins symbols and words without separators and terminates every paragraph with a comma.
    pub fn to_flat_text(&self) -> String {
        let mut text = String::new();
        for paragraph in self
            .pages
            .iter()
            .flat_map(|page| page.blocks.iter())
            .flat_map(|block| block.paragraphs.iter())
        {
            for word in &paragraph.words {
                text.push_str(&word.to_text());
            }
            text.push(',');
        }
        text
    }
}

impl RecognizedParagraph {
    /// Splits `text` into words on whitespace, every char becoming a symbol.
    pub fn from_text(text: &str) -> Self {
        RecognizedParagraph {
            words: text
                .split_whitespace()
                .map(|word| RecognizedWord {
                    symbols: word
                        .chars()
                        .map(|c| RecognizedSymbol {
                            text: c.to_string(),
                            confidence: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl RecognizedWord {
    pub fn to_text(&self) -> String {
        self.symbols
            .iter()
            .map(|symbol| symbol.text.as_str())
            .collect()
    }
}

#[derive(Clone)]
pub enum Recognizers {
    GcpVision(GcpVisionRecognizer),
    #[cfg(feature = "ocr")]
    Ocrs(OcrsRecognizer),
}

#[derive(Debug, Clone)]
pub struct RecognizerOptions {
    pub provider_options: RecognizerProviderOptions,
}

#[derive(Debug, Clone)]
pub enum RecognizerProviderOptions {
    GcpVision(GcpVisionRecognizerOptions),
    #[cfg(feature = "ocr")]
    Ocrs(OcrsRecognizerOptions),
}

impl Display for RecognizerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.provider_options {
            RecognizerProviderOptions::GcpVision(ref options) => match options.project_id {
                Some(ref project_id) => write!(f, "gcp-vision, project: {}", project_id.value()),
                None => write!(f, "gcp-vision"),
            },
            #[cfg(feature = "ocr")]
            RecognizerProviderOptions::Ocrs(_) => write!(f, "ocrs"),
        }
    }
}

impl Recognizers {
    pub async fn new_recognizer(
        recognizer_options: &RecognizerOptions,
        reporter: &AppReporter<'_>,
    ) -> AppResult<Self> {
        match recognizer_options.provider_options {
            RecognizerProviderOptions::GcpVision(ref options) => Ok(Recognizers::GcpVision(
                GcpVisionRecognizer::new(options.clone(), reporter).await?,
            )),
            #[cfg(feature = "ocr")]
            RecognizerProviderOptions::Ocrs(ref options) => Ok(Recognizers::Ocrs(
                OcrsRecognizer::new(options.clone(), reporter)?,
            )),
        }
    }
}

pub trait Recognizer {
    async fn detect_document_text(&self, image: RecognizerImage) -> AppResult<RecognizedDocument>;
}

impl Recognizer for Recognizers {
    async fn detect_document_text(&self, image: RecognizerImage) -> AppResult<RecognizedDocument> {
        match self {
            Recognizers::GcpVision(recognizer) => recognizer.detect_document_text(image).await,
            #[cfg(feature = "ocr")]
            Recognizers::Ocrs(recognizer) => recognizer.detect_document_text(image).await,
        }
    }
}

/// Recognizes every crop in order and concatenates the flattened texts without
/// any separator between crops.
pub async fn analyze_image_text(
    recognizer: &impl Recognizer,
    crop_artifacts: &[CropArtifact],
) -> AppResult<String> {
    let mut text = String::new();
    for artifact in crop_artifacts {
        let data = tokio::fs::read(&artifact.file_path).await?;
        let image = RecognizerImage {
            file_path: artifact.file_path.to_string_lossy().to_string(),
            mime_type: mime::IMAGE_PNG,
            data: data.into(),
        };
        let document = recognizer.detect_document_text(image).await?;
        let segment = document.to_flat_text();
        tracing::debug!(
            region = artifact.region_name.value().as_str(),
            width = artifact.width,
            height = artifact.height,
            confidence = ?document.min_confidence(),
            text = segment.as_str(),
            "Recognized crop"
        );
        text.push_str(&segment);
    }
    Ok(text)
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use crate::common_types::CropRegionName;
    use crate::errors::AppError;
    use std::path::PathBuf;

    struct FileNameRecognizer;

    impl Recognizer for FileNameRecognizer {
        async fn detect_document_text(
            &self,
            image: RecognizerImage,
        ) -> AppResult<RecognizedDocument> {
            let name = PathBuf::from(&image.file_path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(RecognizedDocument::from_paragraphs(vec![
                RecognizedParagraph::from_text(&name),
            ]))
        }
    }

    fn symbols(text: &str) -> RecognizedWord {
        RecognizedWord {
            symbols: text
                .chars()
                .map(|c| RecognizedSymbol {
                    text: c.to_string(),
                    confidence: Some(0.9),
                })
                .collect(),
        }
    }

    #[test]
    fn flatten_joins_words_and_ends_paragraphs_with_comma() {
        let document = RecognizedDocument {
            pages: vec![RecognizedPage {
                blocks: vec![
                    RecognizedBlock {
                        paragraphs: vec![
                            RecognizedParagraph {
                                words: vec![symbols("2023"), symbols("/"), symbols("07")],
                            },
                            RecognizedParagraph {
                                words: vec![symbols("Daily")],
                            },
                        ],
                    },
                    RecognizedBlock {
                        paragraphs: vec![RecognizedParagraph {
                            words: vec![symbols("12"), symbols("%")],
                        }],
                    },
                ],
            }],
        };
        assert_eq!(document.to_flat_text(), "2023/07,Daily,12%,");
        assert_eq!(document.min_confidence(), Some(0.9));
    }

    #[test]
    fn flatten_empty_document() {
        assert_eq!(RecognizedDocument::default().to_flat_text(), "");
        assert_eq!(RecognizedDocument::default().min_confidence(), None);
        let empty_paragraph =
            RecognizedDocument::from_paragraphs(vec![RecognizedParagraph::default()]);
        assert_eq!(empty_paragraph.to_flat_text(), ",");
    }

    #[test]
    fn paragraph_from_text_drops_spaces() {
        let paragraph = RecognizedParagraph::from_text("1 h  23 min");
        assert_eq!(paragraph.words.len(), 4);
        assert_eq!(paragraph.words[3].to_text(), "min");
        assert_eq!(
            RecognizedDocument::from_paragraphs(vec![paragraph]).to_flat_text(),
            "1h23min,"
        );
    }

    #[tokio::test]
    async fn analyze_image_text_keeps_crop_order(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let temp_dir = tempfile::TempDir::with_prefix("recognizers_tests_order")?;
        let artifacts: Vec<CropArtifact> = ["date", "type", "u_percent"]
            .iter()
            .map(|name| CropArtifact {
                region_name: CropRegionName::new(name.to_string()),
                file_path: temp_dir.path().join(format!("{name}.png")),
                width: 1,
                height: 1,
            })
            .collect();
        for artifact in &artifacts {
            tokio::fs::write(&artifact.file_path, b"png").await?;
        }

        let text = analyze_image_text(&FileNameRecognizer, &artifacts).await?;
        assert_eq!(text, "date,type,u_percent,");
        Ok(())
    }

    #[tokio::test]
    async fn analyze_image_text_fails_on_missing_crop(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let temp_dir = tempfile::TempDir::with_prefix("recognizers_tests_missing")?;
        let artifacts = vec![CropArtifact {
            region_name: "date".into(),
            file_path: temp_dir.path().join("date.png"),
            width: 1,
            height: 1,
        }];
        let result = analyze_image_text(&FileNameRecognizer, &artifacts).await;
        assert!(matches!(result, Err(AppError::InputOutputError(_))));
        Ok(())
    }
}
