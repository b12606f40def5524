pub mod jpeg_frame_encoder;
pub mod tcp_connector;
