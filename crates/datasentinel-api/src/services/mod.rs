pub mod billing;
pub mod pipeline;
