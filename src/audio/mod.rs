// Audio module - decoded recordings and the decoders that produce them

pub mod decoder;
pub mod track;

pub use decoder::{AudioDecoder, WavDecoder};
pub use track::AudioTrack;
