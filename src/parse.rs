pub mod markdown;
pub mod path;
pub mod style;
