pub mod book;
pub mod document;
pub mod inherit;
pub mod template;
pub mod viewstate;
