pub mod json_loader;

pub use json_loader::{load_all_input_files, load_input_file, pages_from_value, ScriptInput};
