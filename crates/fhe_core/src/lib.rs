pub mod config;
pub mod error;
pub mod logging;

pub use config::{MNEMONIC_ENV, PERMIT_PASSPHRASE_ENV, SuiteConfig};
pub use error::{Classify, ConfigError, ErrorClass, USER_REJECTED_CODE};
