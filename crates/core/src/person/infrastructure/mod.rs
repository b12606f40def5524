pub mod opaque_cutout_extractor;
