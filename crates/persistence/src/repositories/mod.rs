//! Repository implementations, one per collection.

pub mod air_quality;
pub mod contribution;
pub mod device;
pub mod external_air_quality;
pub mod external_mqtt_source;
pub mod external_source;
pub mod station;
pub mod user;

pub use air_quality::AirQualityRepository;
pub use contribution::{ContributedDataRepository, ContributionRepository};
pub use device::DeviceRepository;
pub use external_air_quality::ExternalAirQualityRepository;
pub use external_mqtt_source::ExternalMqttSourceRepository;
pub use external_source::ExternalSourceRepository;
pub use station::StationRepository;
pub use user::UserRepository;
