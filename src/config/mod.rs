//! Configuration loading

pub mod settings;

pub use settings::{
    parse_style_adapters, BatchConfig, GenerationConfig, LoggingConfig, RefinerConfig, Settings,
    StorageConfig,
};
