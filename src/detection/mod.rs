/// Detector output decoding
///
/// Disambiguates the two output layouts produced by the document detector,
/// filters candidates, maps them back into frame space and scores them.
pub mod decoder;
pub mod layout;

pub use decoder::DetectionDecoder;
pub use layout::{classify_layout, OutputLayout};
