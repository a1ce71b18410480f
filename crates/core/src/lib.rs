mod apply;
mod collision;
mod config;
mod context;
mod exif_reader;
mod mapping;
mod planner;
mod sanitize;
mod scan;
mod template;
mod undo;

pub use apply::{
    execute_plan, ExecuteOptions, ExecutionReport, OperationOutcome, OperationReport,
};
pub use collision::{next_free_variant, DiskOccupancy, PathOccupancy, TargetResolver};
pub use config::{
    app_paths, clear_last_mapping, last_mapping, load_config, load_config_from,
    record_last_mapping, AppConfig, AppPaths,
};
pub use context::{
    build_context, ContextOptions, DateSource, ExifDateSource, NamingContext, NoExif,
};
pub use exif_reader::{read_exif_date, KamadakExifReader};
pub use mapping::{default_mapping_path, MappingError, RenameMapping, RenameOperation};
pub use planner::{
    generate_plan, plan_renames, target_file_name, NamingRules, PlanOptions, RenamePlan,
    RenameStats, DEFAULT_PATTERN,
};
pub use sanitize::sanitize_filename;
pub use scan::{
    enumerate_files, normalize_extensions, sort_entries, FileEntry, FileScan, SkippedFile, SortKey,
};
pub use template::{
    expand, parse_template, validate_template, Field, Placeholder, Template, TemplateError,
    TemplatePart, ValueKind,
};
pub use undo::{undo_mapping, SkippedUndo, UndoResult};
