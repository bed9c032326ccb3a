pub mod aggregator;
pub mod quantum;
pub mod wav_codec;
