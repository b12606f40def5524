pub mod detection;
pub mod person;
pub mod pipeline;
pub mod shared;
pub mod tracking;
pub mod upstream;
pub mod video;
