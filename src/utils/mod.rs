pub mod content_guard;
pub mod pdf;
pub mod text_clean;
pub mod upload;
pub mod web_fetch;
