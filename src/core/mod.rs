pub mod audio;
pub mod deriver;
pub mod dsp;
pub mod pipeline;
pub mod transcriber;
