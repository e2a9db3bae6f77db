use gcloud_sdk::tonic::metadata::errors::InvalidMetadataValue;
use indicatif::style::TemplateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Input/output error")]
    InputOutputError(#[from] std::io::Error),
    #[error("Input directory '{input_dir}' doesn't exist or isn't a directory")]
    InputDirectoryNotFound { input_dir: String },
    #[error("Google Cloud SDK error:\n{0}")]
    GoogleCloudSdkError(#[from] gcloud_sdk::error::Error),
    #[error("Google Cloud SDK error:\n{0}")]
    GoogleCloudGrpcError(#[from] gcloud_sdk::tonic::Status),
    #[error("Google Cloud invalid metadata value:\n{0}")]
    GoogleCloudInvalidMetadataValue(#[from] InvalidMetadataValue),
    #[error("Text recognition error for {file_path}: {message}")]
    RecognitionError { file_path: String, message: String },
    #[error("Recognizer config error: {message}")]
    RecognizerConfigError { message: String },
    #[error("Crop regions config error: {message}")]
    RegionsConfigError { message: String },
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    TemplateError(#[from] TemplateError),
    #[error("Image conversion error: {0}")]
    ImageError(#[from] image::ImageError),
    #[cfg(feature = "ocr")]
    #[error("OCR engine error: {message}")]
    OcrEngineError { message: String },
}
