pub mod error;
pub mod frontmatter;
pub mod markdown;
pub mod model;
pub mod slug;
