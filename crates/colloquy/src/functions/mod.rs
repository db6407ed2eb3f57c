//! Functions that models can suggest calling.

mod list_files;

pub use list_files::ListFiles;
