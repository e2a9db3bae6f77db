use mime::Mime;
use rvstruct::ValueStruct;

mod local;
pub use local::*;

#[derive(Debug, Clone, PartialEq, Eq, ValueStruct)]
pub struct RelativeFilePath(pub String);

#[derive(Debug, Clone)]
pub struct FileSystemRef {
    pub relative_path: RelativeFilePath,
    pub media_type: Option<Mime>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ListFilesResult {
    pub files: Vec<FileSystemRef>,
    pub skipped: usize,
}
