use crate::common_types::CropRegionName;
use crate::errors::AppError;
use crate::AppResult;
use rvstruct::ValueStruct;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Rectangle in source image pixels, addressed by a name that also names its crop file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CropRegion {
    pub name: CropRegionName,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(name: &str, x: u32, y: u32, width: u32, height: u32) -> Self {
        CropRegion {
            name: name.into(),
            x,
            y,
            width,
            height,
        }
    }
}

/// Ordered list of crop regions. The order defines the order of the recognized
/// text segments in every result line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CropRegions {
    pub regions: Vec<CropRegion>,
}

impl Default for CropRegions {
    // Calibrated for the 1080px wide statistics screenshots.
    fn default() -> Self {
        CropRegions {
            regions: vec![
                CropRegion::new("date", 180, 210, 500, 90),
                CropRegion::new("type", 285, 320, 548, 100),
                CropRegion::new("u_percent", 270, 630, 110, 65),
                CropRegion::new("s_percent", 610, 630, 100, 65),
                CropRegion::new("g_percent", 940, 630, 100, 65),
                CropRegion::new("u_time", 734, 1781, 326, 100),
                CropRegion::new("s_time", 734, 1920, 326, 100),
                CropRegion::new("g_time", 734, 2067, 326, 100),
            ],
        }
    }
}

impl CropRegions {
    pub async fn load(config_path: Option<&Path>) -> AppResult<Self> {
        match config_path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                let regions = Self::from_json(&content)?;
                tracing::debug!(
                    path = %path.display(),
                    regions = regions.regions.len(),
                    "Loaded crop regions config"
                );
                Ok(regions)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(content: &str) -> AppResult<Self> {
        let regions: CropRegions = serde_json::from_str(content)?;
        regions.validate()?;
        Ok(regions)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.regions.is_empty() {
            return Err(AppError::RegionsConfigError {
                message: "At least one crop region is required".to_string(),
            });
        }
        let mut names = HashSet::new();
        for region in &self.regions {
            let name = region.name.value();
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(AppError::RegionsConfigError {
                    message: format!(
                        "Region name '{}' may only contain ASCII letters, digits, '_' and '-'",
                        name
                    ),
                });
            }
            if region.width == 0 || region.height == 0 {
                return Err(AppError::RegionsConfigError {
                    message: format!("Region '{}' has an empty size", name),
                });
            }
            if !names.insert(name.as_str()) {
                return Err(AppError::RegionsConfigError {
                    message: format!("Region '{}' is defined more than once", name),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CropRegion> {
        self.regions.iter()
    }
}

#[allow(unused_imports)]
mod tests {
    use super::*;

    #[test]
    fn default_regions_are_valid() {
        let regions = CropRegions::default();
        assert!(regions.validate().is_ok());
        assert_eq!(
            regions
                .iter()
                .map(|r| r.name.value().as_str())
                .collect::<Vec<_>>(),
            vec![
                "date",
                "type",
                "u_percent",
                "s_percent",
                "g_percent",
                "u_time",
                "s_time",
                "g_time"
            ]
        );
    }

    #[test]
    fn parse_regions_json() -> AppResult<()> {
        let regions = CropRegions::from_json(
            r#"{"regions":[{"name":"date","x":1,"y":2,"width":3,"height":4},{"name":"total","x":5,"y":6,"width":7,"height":8}]}"#,
        )?;
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.regions[0], CropRegion::new("date", 1, 2, 3, 4));
        assert_eq!(regions.regions[1], CropRegion::new("total", 5, 6, 7, 8));
        Ok(())
    }

    #[test]
    fn reject_invalid_regions() {
        for json in [
            r#"{"regions":[]}"#,
            r#"{"regions":[{"name":"a","x":0,"y":0,"width":0,"height":4}]}"#,
            r#"{"regions":[{"name":"../a","x":0,"y":0,"width":3,"height":4}]}"#,
            r#"{"regions":[{"name":"a","x":0,"y":0,"width":3,"height":4},{"name":"a","x":1,"y":1,"width":3,"height":4}]}"#,
        ] {
            assert!(
                matches!(
                    CropRegions::from_json(json),
                    Err(AppError::RegionsConfigError { .. })
                ),
                "{json} should be rejected"
            );
        }
        assert!(matches!(
            CropRegions::from_json("{"),
            Err(AppError::JsonError(_))
        ));
    }
}
