pub mod error;
pub mod format;
pub mod scene;
pub mod util;
