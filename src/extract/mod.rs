pub mod normalizer;
pub mod pipeline;
pub mod selector;
pub mod xpath;

pub use selector::CompiledSelector;
