pub mod atlas;
pub use atlas::AtlasBuilder;
pub mod collage;
pub use collage::Collage;
pub mod epu;
pub use epu::{AtlasLocation, EpuParser};
pub mod metadata;
pub mod mrc;
pub mod plot;
