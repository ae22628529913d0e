pub mod json_file;
pub(crate) mod lock;
