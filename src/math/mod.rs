pub mod path;
pub mod tick_math;
