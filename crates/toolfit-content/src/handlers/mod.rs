//! Format-specific handlers

pub mod toml;
pub mod yaml;

pub use self::toml::TomlHandler;
pub use self::yaml::YamlHandler;
