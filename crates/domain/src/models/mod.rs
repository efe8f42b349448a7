//! Domain models for AirWatch.

pub mod air_quality;
pub mod contribution;
pub mod device;
pub mod external_air_quality;
pub mod external_mqtt_source;
pub mod external_source;
pub mod ngsi;
pub mod station;
pub mod user;

pub use air_quality::AirQuality;
pub use contribution::{ContributedAirQuality, Contribution};
pub use device::Device;
pub use external_air_quality::ExternalAirQuality;
pub use external_mqtt_source::ExternalMqttSource;
pub use external_source::ExternalSource;
pub use station::Station;
pub use user::User;
