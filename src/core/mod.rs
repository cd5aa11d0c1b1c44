pub mod config;
pub mod config_loader;
pub mod error;
pub mod template;
pub mod traits;

pub use config::{DeployConfig, Settings};
pub use config_loader::{ConfigLoadOptions, ConfigLoader, CONFIG_FILENAME};
pub use error::*;
pub use template::{CommandTemplate, RenderedCommand, TemplateContext};
pub use traits::*;
