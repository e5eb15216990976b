use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Store is not a pixel-duper fingerprint store")]
    BadMagic,

    #[error("Store version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Corrupt store record: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, Error>;
