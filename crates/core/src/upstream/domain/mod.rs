pub mod connector;
pub mod destination;
pub mod frame_encoder;
pub mod upstream_channel;
pub mod upstream_record;
