pub mod names;
pub mod record;
pub mod settings;
