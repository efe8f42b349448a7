//! Application services: the event hub, the MQTT ingestion manager and
//! CSV export helpers.

pub mod export;
pub mod hub;
pub mod mqtt;

pub use hub::EventHub;
pub use mqtt::MqttManager;
