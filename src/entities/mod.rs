pub mod category_file;
pub mod content_file;
