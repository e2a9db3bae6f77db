use crate::common_types::GcpProjectId;
use crate::errors::AppError;
use crate::recognizers::{
    RecognizedBlock, RecognizedDocument, RecognizedPage, RecognizedParagraph, RecognizedSymbol,
    RecognizedWord, Recognizer, RecognizerImage,
};
use crate::reporter::AppReporter;
use crate::AppResult;
use gcloud_sdk::google::cloud::vision::v1::image_annotator_client::ImageAnnotatorClient;
use gcloud_sdk::tonic::metadata::MetadataValue;
use gcloud_sdk::{tonic, GoogleApi, GoogleAuthMiddleware};
use rvstruct::ValueStruct;

#[derive(Clone)]
pub struct GcpVisionRecognizer {
    client: GoogleApi<ImageAnnotatorClient<GoogleAuthMiddleware>>,
    options: GcpVisionRecognizerOptions,
}

#[derive(Debug, Clone)]
pub struct GcpVisionRecognizerOptions {
    /// Project billed for the API calls instead of the one from the credentials.
    pub project_id: Option<GcpProjectId>,
}

const VISION_API_URL: &str = "https://vision.googleapis.com";

impl GcpVisionRecognizer {
    pub async fn new(
        options: GcpVisionRecognizerOptions,
        reporter: &AppReporter<'_>,
    ) -> AppResult<Self> {
        reporter.report(format!("Connecting to Cloud Vision at {}", VISION_API_URL))?;
        let client =
            GoogleApi::from_function(ImageAnnotatorClient::new, VISION_API_URL, None).await?;
        Ok(GcpVisionRecognizer { client, options })
    }

    fn create_request(
        image: RecognizerImage,
    ) -> gcloud_sdk::google::cloud::vision::v1::BatchAnnotateImagesRequest {
        gcloud_sdk::google::cloud::vision::v1::BatchAnnotateImagesRequest {
            requests: vec![gcloud_sdk::google::cloud::vision::v1::AnnotateImageRequest {
                image: Some(gcloud_sdk::google::cloud::vision::v1::Image {
                    content: image.data.to_vec(),
                    ..gcloud_sdk::google::cloud::vision::v1::Image::default()
                }),
                features: vec![gcloud_sdk::google::cloud::vision::v1::Feature {
                    r#type: gcloud_sdk::google::cloud::vision::v1::feature::Type::DocumentTextDetection
                        .into(),
                    ..gcloud_sdk::google::cloud::vision::v1::Feature::default()
                }],
                ..gcloud_sdk::google::cloud::vision::v1::AnnotateImageRequest::default()
            }],
            ..gcloud_sdk::google::cloud::vision::v1::BatchAnnotateImagesRequest::default()
        }
    }

    /// Only the first per-image response is used since every request carries one image.
    /// A response without a full text annotation means nothing was found.
    fn document_from_response(
        file_path: String,
        response: gcloud_sdk::google::cloud::vision::v1::BatchAnnotateImagesResponse,
    ) -> AppResult<RecognizedDocument> {
        match response.responses.into_iter().next() {
            Some(image_response) => match image_response.error {
                Some(status) if status.code != 0 => Err(AppError::RecognitionError {
                    file_path,
                    message: format!("{} (code: {})", status.message, status.code),
                }),
                _ => Ok(image_response
                    .full_text_annotation
                    .map(RecognizedDocument::from)
                    .unwrap_or_default()),
            },
            None => Err(AppError::RecognitionError {
                file_path,
                message: "No annotation in the response".to_string(),
            }),
        }
    }
}

impl Recognizer for GcpVisionRecognizer {
    async fn detect_document_text(&self, image: RecognizerImage) -> AppResult<RecognizedDocument> {
        let file_path = image.file_path.clone();
        tracing::debug!(
            file_path = file_path.as_str(),
            mime_type = %image.mime_type,
            size = image.data.len(),
            "Sending document text detection request"
        );
        let mut request = tonic::Request::new(Self::create_request(image));
        if let Some(ref project_id) = self.options.project_id {
            request.metadata_mut().insert(
                "x-goog-user-project",
                MetadataValue::<tonic::metadata::Ascii>::try_from(project_id.value())?,
            );
        }
        let response = self.client.get().batch_annotate_images(request).await?;
        Self::document_from_response(file_path, response.into_inner())
    }
}

impl From<gcloud_sdk::google::cloud::vision::v1::TextAnnotation> for RecognizedDocument {
    fn from(annotation: gcloud_sdk::google::cloud::vision::v1::TextAnnotation) -> Self {
        RecognizedDocument {
            pages: annotation
                .pages
                .into_iter()
                .map(|page| RecognizedPage {
                    blocks: page
                        .blocks
                        .into_iter()
                        .map(|block| RecognizedBlock {
                            paragraphs: block
                                .paragraphs
                                .into_iter()
                                .map(|paragraph| RecognizedParagraph {
                                    words: paragraph
                                        .words
                                        .into_iter()
                                        .map(|word| RecognizedWord {
                                            symbols: word
                                                .symbols
                                                .into_iter()
                                                .map(|symbol| RecognizedSymbol {
                                                    text: symbol.text,
                                                    confidence: Some(symbol.confidence),
                                                })
                                                .collect(),
                                        })
                                        .collect(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use console::Term;
    use gcloud_sdk::google::cloud::vision::v1::{
        AnnotateImageResponse, BatchAnnotateImagesResponse, Block, Page, Paragraph, Symbol,
        TextAnnotation, Word,
    };

    fn word(text: &str) -> Word {
        Word {
            symbols: text
                .chars()
                .map(|c| Symbol {
                    text: c.to_string(),
                    confidence: 0.98,
                    ..Symbol::default()
                })
                .collect(),
            ..Word::default()
        }
    }

    #[test]
    fn convert_text_annotation() {
        let annotation = TextAnnotation {
            pages: vec![Page {
                blocks: vec![Block {
                    paragraphs: vec![
                        Paragraph {
                            words: vec![word("45"), word("%")],
                            ..Paragraph::default()
                        },
                        Paragraph {
                            words: vec![word("3h"), word("12m")],
                            ..Paragraph::default()
                        },
                    ],
                    ..Block::default()
                }],
                ..Page::default()
            }],
            text: "45 %\n3h 12m".to_string(),
            ..TextAnnotation::default()
        };
        let document = RecognizedDocument::from(annotation);
        assert_eq!(document.to_flat_text(), "45%,3h12m,");
        assert_eq!(
            document.pages[0].blocks[0].paragraphs[0].words[0].symbols[0].confidence,
            Some(0.98)
        );
    }

    #[test]
    fn request_asks_for_document_text_detection() {
        let request = GcpVisionRecognizer::create_request(RecognizerImage {
            file_path: "tmp/date.png".to_string(),
            mime_type: mime::IMAGE_PNG,
            data: bytes::Bytes::from_static(b"png-bytes"),
        });
        assert_eq!(request.requests.len(), 1);
        let image_request = &request.requests[0];
        assert_eq!(
            image_request.image.as_ref().map(|image| image.content.clone()),
            Some(b"png-bytes".to_vec())
        );
        assert_eq!(
            image_request.features[0].r#type,
            i32::from(
                gcloud_sdk::google::cloud::vision::v1::feature::Type::DocumentTextDetection
            )
        );
    }

    #[test]
    fn response_with_error_status_is_recognition_error() {
        let response = BatchAnnotateImagesResponse {
            responses: vec![AnnotateImageResponse {
                error: Some(gcloud_sdk::google::rpc::Status {
                    code: 3,
                    message: "Bad image data.".to_string(),
                    ..gcloud_sdk::google::rpc::Status::default()
                }),
                ..AnnotateImageResponse::default()
            }],
            ..BatchAnnotateImagesResponse::default()
        };
        match GcpVisionRecognizer::document_from_response("tmp/date.png".to_string(), response) {
            Err(AppError::RecognitionError { file_path, message }) => {
                assert_eq!(file_path, "tmp/date.png");
                assert_eq!(message, "Bad image data. (code: 3)");
            }
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_response_is_recognition_error() {
        let response = BatchAnnotateImagesResponse::default();
        assert!(matches!(
            GcpVisionRecognizer::document_from_response("tmp/type.png".to_string(), response),
            Err(AppError::RecognitionError { .. })
        ));
    }

    #[test]
    fn response_without_annotation_is_empty_document() -> AppResult<()> {
        let response = BatchAnnotateImagesResponse {
            responses: vec![AnnotateImageResponse {
                error: Some(gcloud_sdk::google::rpc::Status::default()),
                ..AnnotateImageResponse::default()
            }],
            ..BatchAnnotateImagesResponse::default()
        };
        let document =
            GcpVisionRecognizer::document_from_response("tmp/g_time.png".to_string(), response)?;
        assert!(document.pages.is_empty());
        assert_eq!(document.to_flat_text(), "");
        Ok(())
    }

    #[test]
    fn response_with_annotation_is_converted() -> AppResult<()> {
        let response = BatchAnnotateImagesResponse {
            responses: vec![AnnotateImageResponse {
                full_text_annotation: Some(TextAnnotation {
                    pages: vec![Page {
                        blocks: vec![Block {
                            paragraphs: vec![Paragraph {
                                words: vec![word("55"), word("%")],
                                ..Paragraph::default()
                            }],
                            ..Block::default()
                        }],
                        ..Page::default()
                    }],
                    ..TextAnnotation::default()
                }),
                ..AnnotateImageResponse::default()
            }],
            ..BatchAnnotateImagesResponse::default()
        };
        let document =
            GcpVisionRecognizer::document_from_response("tmp/u_percent.png".to_string(), response)?;
        assert_eq!(document.to_flat_text(), "55%,");
        Ok(())
    }

    #[tokio::test]
    #[cfg_attr(not(feature = "ci-gcp"), ignore)]
    async fn detect_document_text_test() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let term = Term::stdout();
        let reporter: AppReporter = AppReporter::from(&term);
        let test_gcp_project_id =
            std::env::var("TEST_GCP_PROJECT").expect("TEST_GCP_PROJECT required");
        let data = tokio::fs::read("test-fixtures/media/text-sample.png").await?;

        let recognizer = GcpVisionRecognizer::new(
            GcpVisionRecognizerOptions {
                project_id: Some(GcpProjectId::new(test_gcp_project_id)),
            },
            &reporter,
        )
        .await?;

        let document = recognizer
            .detect_document_text(RecognizerImage {
                file_path: "test-fixtures/media/text-sample.png".to_string(),
                mime_type: mime::IMAGE_PNG,
                data: data.into(),
            })
            .await?;
        assert!(!document.to_flat_text().is_empty());
        Ok(())
    }
}
