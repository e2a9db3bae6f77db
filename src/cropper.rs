use crate::common_types::CropArtifact;
use crate::crop_regions::{CropRegion, CropRegions};
use crate::AppResult;
use image::{DynamicImage, ImageFormat};
use rvstruct::ValueStruct;
use std::path::{Path, PathBuf};

/// Cuts `region` out of `image`.
///
/// Regions reaching past the image edges are truncated to the part that overlaps the image.
pub fn crop_image(image: &DynamicImage, region: &CropRegion) -> DynamicImage {
    image.crop_imm(region.x, region.y, region.width, region.height)
}

pub fn crop_file_path(tmp_dir: &Path, region: &CropRegion) -> PathBuf {
    tmp_dir.join(format!("{}.png", region.name.value()))
}

pub async fn read_image(file_path: &Path) -> AppResult<DynamicImage> {
    let data = tokio::fs::read(file_path).await?;
    Ok(image::load_from_memory(&data)?)
}

/// Decodes the source image once and writes one PNG per region into `tmp_dir`,
/// replacing the crops left from the previous source image.
pub async fn prepare_crop_images(
    source_path: &Path,
    regions: &CropRegions,
    tmp_dir: &Path,
) -> AppResult<Vec<CropArtifact>> {
    let image = read_image(source_path).await?;
    tracing::debug!(
        source = %source_path.display(),
        width = image.width(),
        height = image.height(),
        "Decoded source image"
    );

    tokio::fs::create_dir_all(tmp_dir).await?;

    let mut artifacts = Vec::with_capacity(regions.len());
    for region in regions.iter() {
        let cropped = crop_image(&image, region);
        let file_path = crop_file_path(tmp_dir, region);
        let mut output = std::io::Cursor::new(Vec::new());
        cropped.write_to(&mut output, ImageFormat::Png)?;
        tokio::fs::write(&file_path, output.into_inner()).await?;
        tracing::debug!(
            region = region.name.value().as_str(),
            path = %file_path.display(),
            width = cropped.width(),
            height = cropped.height(),
            "Saved crop"
        );
        artifacts.push(CropArtifact {
            region_name: region.name.clone(),
            file_path,
            width: cropped.width(),
            height: cropped.height(),
        });
    }
    Ok(artifacts)
}

#[allow(unused_imports)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn crop_default_regions_to_exact_size() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1080, 2200));
        for region in CropRegions::default().iter() {
            let cropped = crop_image(&image, region);
            assert_eq!(
                (cropped.width(), cropped.height()),
                (region.width, region.height),
                "region {}",
                region.name.value()
            );
        }
    }

    #[test]
    fn crop_keeps_pixels_of_region() {
        let mut source = RgbImage::new(20, 20);
        source.put_pixel(5, 6, Rgb([200, 10, 10]));
        let image = DynamicImage::ImageRgb8(source);
        let cropped = crop_image(&image, &CropRegion::new("dot", 5, 6, 4, 4));
        assert_eq!(cropped.get_pixel(0, 0).0, [200, 10, 10, 255]);
        assert_eq!(cropped.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn crop_truncates_out_of_bounds_region() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let cropped = crop_image(&image, &CropRegion::new("edge", 80, 40, 50, 50));
        assert_eq!((cropped.width(), cropped.height()), (20, 10));
    }

    #[tokio::test]
    async fn prepare_crop_images_writes_one_file_per_region(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let temp_dir = tempfile::TempDir::with_prefix("cropper_tests_prepare")?;
        let source_path = temp_dir.path().join("source.png");
        RgbImage::from_pixel(64, 64, Rgb([30, 60, 90])).save(&source_path)?;
        let tmp_dir = temp_dir.path().join("tmp");
        let regions = CropRegions {
            regions: vec![
                CropRegion::new("first", 0, 0, 10, 12),
                CropRegion::new("second", 20, 20, 30, 8),
            ],
        };

        let artifacts = prepare_crop_images(&source_path, &regions, &tmp_dir).await?;

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].file_path, tmp_dir.join("first.png"));
        assert_eq!(artifacts[1].file_path, tmp_dir.join("second.png"));
        let second = image::open(&artifacts[1].file_path)?;
        assert_eq!((second.width(), second.height()), (30, 8));
        assert_eq!(second.get_pixel(3, 3).0, [30, 60, 90, 255]);
        Ok(())
    }

    #[tokio::test]
    async fn prepare_crop_images_overwrites_previous_crops(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let temp_dir = tempfile::TempDir::with_prefix("cropper_tests_overwrite")?;
        let tmp_dir = temp_dir.path().join("tmp");
        let regions = CropRegions {
            regions: vec![CropRegion::new("only", 0, 0, 4, 4)],
        };
        for (name, value) in [("a.png", 10u8), ("b.png", 250u8)] {
            let source_path = temp_dir.path().join(name);
            RgbImage::from_pixel(8, 8, Rgb([value, value, value])).save(&source_path)?;
            prepare_crop_images(&source_path, &regions, &tmp_dir).await?;
        }
        let crop = image::open(tmp_dir.join("only.png"))?;
        assert_eq!(crop.get_pixel(0, 0).0, [250, 250, 250, 255]);
        Ok(())
    }

    #[tokio::test]
    async fn prepare_crop_images_fails_on_corrupt_source(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let temp_dir = tempfile::TempDir::with_prefix("cropper_tests_corrupt")?;
        let source_path = temp_dir.path().join("broken.png");
        tokio::fs::write(&source_path, b"not an image").await?;
        let result =
            prepare_crop_images(&source_path, &CropRegions::default(), temp_dir.path()).await;
        assert!(matches!(result, Err(AppError::ImageError(_))));
        Ok(())
    }
}
