pub mod image_processor;
pub mod naming;

/// Lowercases and replaces every non-alphanumeric character with `-`.
pub fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
}
