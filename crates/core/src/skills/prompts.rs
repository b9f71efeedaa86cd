//! Default prompt templates bundled at compile time.

/// General code generation
pub const CODE_GENERATOR: &str = include_str!("defaults/code_generator.md");

/// Single type / class generation
pub const CLASS_GENERATOR: &str = include_str!("defaults/class_generator.md");

/// Single function generation
pub const FUNCTION_GENERATOR: &str = include_str!("defaults/function_generator.md");

/// Algorithm implementation with complexity notes
pub const ALGORITHM_GENERATOR: &str = include_str!("defaults/algorithm_generator.md");

/// System prompt for a generation subtype; unknown subtypes get the general one
pub fn for_subtype(subtype: &str) -> &'static str {
    match subtype {
        "class" => CLASS_GENERATOR,
        "function" => FUNCTION_GENERATOR,
        "algorithm" => ALGORITHM_GENERATOR,
        _ => CODE_GENERATOR,
    }
}

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("code_generator", CODE_GENERATOR),
        ("class_generator", CLASS_GENERATOR),
        ("function_generator", FUNCTION_GENERATOR),
        ("algorithm_generator", ALGORITHM_GENERATOR),
    ]
}
