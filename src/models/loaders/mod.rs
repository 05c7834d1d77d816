pub mod toml_loader;

pub use toml_loader::{load_exam_manifest, parse_exam_manifest};
