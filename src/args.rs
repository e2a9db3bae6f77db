use crate::common_types::GcpProjectId;
use crate::errors::AppError;
use crate::recognizers::{GcpVisionRecognizerOptions, RecognizerOptions, RecognizerProviderOptions};
use clap::*;
use std::fmt::Display;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    #[command(
        about = "Crop regions from every image in the input directory, recognize their text and append one line per image to the result file"
    )]
    Run {
        #[arg(help = "Directory with the source screenshots", default_value = "img")]
        input: String,
        #[arg(
            short = 'o',
            long,
            help = "Result file, lines are appended",
            default_value = "result.csv"
        )]
        output: PathBuf,
        #[arg(
            long,
            help = "Directory for the intermediate crop images",
            default_value = "tmp"
        )]
        tmp_dir: PathBuf,
        #[command(flatten)]
        input_args: InputArgs,
        #[arg(
            long,
            value_enum,
            help = "What to do when an image fails to be processed",
            default_value_t = ErrorPolicy::Abort
        )]
        on_error: ErrorPolicy,
        #[command(flatten)]
        recognizer_args: RecognizerArgs,
    },
    #[command(about = "List the images and crop regions a run would use")]
    Ls {
        #[arg(help = "Directory with the source screenshots", default_value = "img")]
        input: String,
        #[command(flatten)]
        input_args: InputArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    #[arg(
        short = 'f',
        long,
        help = "Filter by name using glob patterns such as *.png"
    )]
    pub filename_filter: Option<globset::Glob>,
    #[arg(short = 'm', long, help = "Maximum size of images to process in bytes")]
    pub max_size_limit: Option<u64>,
    #[arg(
        long,
        help = "JSON file with the crop regions: {\"regions\":[{\"name\":\"date\",\"x\":180,\"y\":210,\"width\":500,\"height\":90}]}"
    )]
    pub regions_config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Abort,
    Skip,
}

impl Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Abort => write!(f, "abort"),
            ErrorPolicy::Skip => write!(f, "skip"),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerType {
    GcpVision,
    #[cfg(feature = "ocr")]
    Ocrs,
}

impl Display for RecognizerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognizerType::GcpVision => write!(f, "gcp-vision"),
            #[cfg(feature = "ocr")]
            RecognizerType::Ocrs => write!(f, "ocrs"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RecognizerArgs {
    #[arg(
        short = 'r',
        long,
        value_enum,
        help = "Text recognizer",
        default_value_t = RecognizerType::GcpVision
    )]
    pub recognizer: RecognizerType,

    #[arg(
        long,
        help = "GCP project id that will be used to bill Cloud Vision API calls"
    )]
    pub gcp_project_id: Option<GcpProjectId>,

    #[arg(long, help = "Directory with the ocrs text detection/recognition models")]
    pub ocrs_models_dir: Option<PathBuf>,
}

impl TryInto<RecognizerOptions> for RecognizerArgs {
    type Error = AppError;

    fn try_into(self) -> Result<RecognizerOptions, Self::Error> {
        let provider_options = match self.recognizer {
            RecognizerType::GcpVision => {
                if self.ocrs_models_dir.is_some() {
                    return Err(AppError::RecognizerConfigError {
                        message: "ocrs models dir is only supported by the ocrs recognizer"
                            .to_string(),
                    });
                }
                RecognizerProviderOptions::GcpVision(GcpVisionRecognizerOptions {
                    project_id: self.gcp_project_id,
                })
            }
            #[cfg(feature = "ocr")]
            RecognizerType::Ocrs => {
                if self.gcp_project_id.is_some() {
                    return Err(AppError::RecognizerConfigError {
                        message: "GCP project id is only supported by the gcp-vision recognizer"
                            .to_string(),
                    });
                }
                RecognizerProviderOptions::Ocrs(crate::recognizers::OcrsRecognizerOptions {
                    models_dir: self.ocrs_models_dir,
                })
            }
        };
        Ok(RecognizerOptions { provider_options })
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = CliArgs::parse_from(["crop-ocr", "run"]);
        match cli.command {
            CliCommand::Run {
                input,
                output,
                tmp_dir,
                on_error,
                recognizer_args,
                input_args,
            } => {
                assert_eq!(input, "img");
                assert_eq!(output, PathBuf::from("result.csv"));
                assert_eq!(tmp_dir, PathBuf::from("tmp"));
                assert_eq!(on_error, ErrorPolicy::Abort);
                assert_eq!(recognizer_args.recognizer, RecognizerType::GcpVision);
                assert!(input_args.regions_config.is_none());
            }
            CliCommand::Ls { .. } => panic!("Unexpected command"),
        }
    }

    #[test]
    fn parse_run_options() -> Result<(), AppError> {
        let cli = CliArgs::parse_from([
            "crop-ocr",
            "run",
            "shots",
            "-o",
            "out.csv",
            "--on-error",
            "skip",
            "--gcp-project-id",
            "my-project",
            "-f",
            "*.png",
        ]);
        match cli.command {
            CliCommand::Run {
                input,
                on_error,
                recognizer_args,
                input_args,
                ..
            } => {
                assert_eq!(input, "shots");
                assert_eq!(on_error, ErrorPolicy::Skip);
                assert!(input_args.filename_filter.is_some());
                let options: RecognizerOptions = recognizer_args.try_into()?;
                assert_eq!(options.to_string(), "gcp-vision, project: my-project");
            }
            CliCommand::Ls { .. } => panic!("Unexpected command"),
        }
        Ok(())
    }

    #[test]
    fn reject_models_dir_for_cloud_recognizer() {
        let args = RecognizerArgs {
            recognizer: RecognizerType::GcpVision,
            gcp_project_id: None,
            ocrs_models_dir: Some(PathBuf::from("models")),
        };
        let options: Result<RecognizerOptions, AppError> = args.try_into();
        assert!(matches!(
            options,
            Err(AppError::RecognizerConfigError { .. })
        ));
    }
}
