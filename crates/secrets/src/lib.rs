//! Access to the tenant's secret store through a rotating wrapped token.

pub mod broker;
pub mod client;
pub mod config;
pub mod error;
pub mod response;
pub mod wrap_file;

use std::sync::{Arc, OnceLock};

pub use broker::SecretBroker;
pub use config::{BrokerConfig, KvVersion, RetryPolicy, SecretRef};
pub use error::SecretError;
pub use response::SecretData;

static GLOBAL: OnceLock<Arc<SecretBroker>> = OnceLock::new();

/// Install the process-wide broker. Returns `false` if one was already set.
pub fn install(broker: Arc<SecretBroker>) -> bool {
    GLOBAL.set(broker).is_ok()
}

/// The process-wide broker, if the secret store is enabled.
pub fn global() -> Option<Arc<SecretBroker>> {
    GLOBAL.get().cloned()
}
