pub mod diagnostics;
pub mod lifecycle;
pub mod state;
pub mod swap;
