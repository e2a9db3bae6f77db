use rvstruct::ValueStruct;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, ValueStruct)]
pub struct GcpProjectId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, ValueStruct, Deserialize, Serialize)]
pub struct CropRegionName(String);

/// A crop produced for one region of the current source image.
#[derive(Debug, Clone)]
pub struct CropArtifact {
    pub region_name: CropRegionName,
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
}
