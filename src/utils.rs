use std::env;

pub const SPLEETER_ENV: &str = "STEM_TRANSCRIBER_SPLEETER";
pub const SPLEETER_MODEL_ENV: &str = "STEM_TRANSCRIBER_SPLEETER_MODEL";
pub const BASIC_PITCH_ENV: &str = "STEM_TRANSCRIBER_BASIC_PITCH";

pub fn spleeter_command() -> String {
    env::var(SPLEETER_ENV).unwrap_or_else(|_| "spleeter".to_string())
}

pub fn spleeter_model() -> String {
    env::var(SPLEETER_MODEL_ENV).unwrap_or_else(|_| "spleeter:5stems".to_string())
}

pub fn basic_pitch_command() -> String {
    env::var(BASIC_PITCH_ENV).unwrap_or_else(|_| "basic-pitch".to_string())
}
