#[cfg(feature = "integration_mqtt")]
pub mod mqtt;
