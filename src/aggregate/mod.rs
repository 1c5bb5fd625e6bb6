mod exec;
mod expr;

pub use exec::run_pipeline;
