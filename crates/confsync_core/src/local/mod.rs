//! Local side: project directory files and the local unit of work.

mod cleanup;
mod files;
mod load;
mod mapper;
mod scan;
mod uow;
mod workers;

pub use cleanup::delete_empty_directories;
pub use files::{
    read_json_file, read_text_file, rename_batch, FileContent, ObjectFile, SaveTransaction,
    BACKUP_SUFFIX,
};
pub use load::{link_variables, load_local_state};
pub use mapper::{load_object, object_files, LoadOutcome, MapperContext, SHARED_CODE_CONTENT_KEY};
pub use scan::PathsState;
pub use uow::{mapper_context, LocalChange, LocalUnitOfWork, PathUpdate};
pub use workers::{split_results, Workers, DEFAULT_MAX_WORKERS};
