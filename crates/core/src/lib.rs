pub mod error;
pub mod generation;
pub mod hardware_spec;
pub mod options;
pub mod prompt;
pub mod signature;
pub mod system_prompt;
pub mod types;
pub mod upscale;
