pub mod extract_tool;
pub mod source;
pub mod summarize_tool;
