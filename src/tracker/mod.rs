pub mod decision;
pub mod runner;

pub use runner::ItemRunner;
