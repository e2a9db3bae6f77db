use crate::crop_regions::CropRegions;
use crate::file_systems::LocalFileSystem;
use crate::file_tools::FileMatcher;
use crate::AppResult;
use console::{pad_str, Alignment, Style, Term};
use indicatif::{HumanBytes, TermLike};
use rvstruct::ValueStruct;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LsCommandOptions {
    pub file_matcher: FileMatcher,
    pub regions_config: Option<PathBuf>,
}

impl LsCommandOptions {
    pub fn new(
        filename_filter: Option<globset::Glob>,
        max_size_limit: Option<u64>,
        regions_config: Option<PathBuf>,
    ) -> Self {
        LsCommandOptions {
            file_matcher: FileMatcher::from_args(filename_filter.as_ref(), max_size_limit),
            regions_config,
        }
    }
}

pub async fn command_ls(term: &Term, input: &str, options: LsCommandOptions) -> AppResult<()> {
    let bold_style = Style::new().bold();
    let highlighted = bold_style.clone().white();
    let dimmed_style = Style::new().dim();
    term.write_line(format!("Listing images in {}.", bold_style.apply_to(input)).as_str())?;
    let app_reporter = crate::reporter::AppReporter::from(term);
    let source_fs = LocalFileSystem::new(input, &app_reporter).await?;
    let list_files_result = source_fs.list_files(Some(&options.file_matcher)).await?;
    let total_size: u64 = list_files_result
        .files
        .iter()
        .map(|f| f.file_size.unwrap_or(0))
        .sum();

    if !list_files_result.files.is_empty() {
        let max_filename_width = std::cmp::min(
            list_files_result
                .files
                .iter()
                .map(|f| f.relative_path.value().len())
                .max()
                .unwrap_or(25)
                + 5,
            (term.width() * 2 / 3) as usize,
        );
        term.write_line(
            format!(
                "\n  {} {} {}",
                dimmed_style.apply_to(pad_str(
                    "Filename",
                    max_filename_width,
                    Alignment::Left,
                    None
                )),
                dimmed_style.apply_to(pad_str("Media Type", 20, Alignment::Left, None)),
                dimmed_style.apply_to(pad_str("Size", 16, Alignment::Left, None))
            )
            .as_str(),
        )?;

        for file in &list_files_result.files {
            term.write_line(
                format!(
                    "- {} {} {}",
                    highlighted.apply_to(pad_str(
                        file.relative_path.value(),
                        max_filename_width,
                        Alignment::Left,
                        Some("...")
                    )),
                    pad_str(
                        file.media_type
                            .as_ref()
                            .map(|mime| mime.to_string())
                            .unwrap_or_default()
                            .as_str(),
                        20,
                        Alignment::Left,
                        None
                    ),
                    highlighted.apply_to(pad_str(
                        format!("{}", HumanBytes(file.file_size.unwrap_or(0))).as_str(),
                        16,
                        Alignment::Left,
                        None
                    ))
                )
                .as_str(),
            )?;
        }
        term.write_line("")?;
    }
    term.write_line(
        format!(
            "{} images found. Total size: {}",
            highlighted.apply_to(list_files_result.files.len()),
            highlighted.apply_to(HumanBytes(total_size))
        )
        .as_str(),
    )?;
    term.write_line(
        format!(
            "{} files skipped/filtered out.",
            dimmed_style.apply_to(list_files_result.skipped.to_string())
        )
        .as_str(),
    )?;

    let regions = CropRegions::load(options.regions_config.as_deref()).await?;
    term.write_line(
        format!(
            "\nCrop regions (in output order):\n  {} {} {} {} {}",
            dimmed_style.apply_to(pad_str("Name", 16, Alignment::Left, None)),
            dimmed_style.apply_to(pad_str("X", 6, Alignment::Right, None)),
            dimmed_style.apply_to(pad_str("Y", 6, Alignment::Right, None)),
            dimmed_style.apply_to(pad_str("Width", 6, Alignment::Right, None)),
            dimmed_style.apply_to(pad_str("Height", 6, Alignment::Right, None)),
        )
        .as_str(),
    )?;
    for region in regions.iter() {
        term.write_line(
            format!(
                "- {} {} {} {} {}",
                highlighted.apply_to(pad_str(
                    region.name.value(),
                    16,
                    Alignment::Left,
                    Some("...")
                )),
                pad_str(&region.x.to_string(), 6, Alignment::Right, None),
                pad_str(&region.y.to_string(), 6, Alignment::Right, None),
                pad_str(&region.width.to_string(), 6, Alignment::Right, None),
                pad_str(&region.height.to_string(), 6, Alignment::Right, None),
            )
            .as_str(),
        )?;
    }
    Ok(())
}
