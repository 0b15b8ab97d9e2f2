//! CLI commands implementation

pub mod crawl;
pub mod init;
pub mod sample;
pub mod session;

pub use crawl::*;
pub use init::*;
pub use sample::*;
pub use session::*;
