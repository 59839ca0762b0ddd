use thiserror::Error;

/// Error codes reported by engine operations.
///
/// Failing operations return these through `Result`; mutating operations
/// additionally record the last failure on the engine (see
/// [`crate::Engine::last_error`]).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("not enough memory")]
    OutOfMemory,

    #[error("layer index out of range")]
    IdxLayer,

    #[error("sprite index out of range")]
    IdxSprite,

    #[error("animation index out of range")]
    IdxAnimation,

    #[error("picture or tile index out of range")]
    IdxPicture,

    #[error("invalid tileset reference")]
    RefTileset,

    #[error("invalid tilemap reference")]
    RefTilemap,

    #[error("invalid palette reference")]
    RefPalette,

    #[error("invalid sequence reference")]
    RefSequence,

    #[error("invalid bitmap reference")]
    RefBitmap,

    #[error("invalid object list reference")]
    RefList,

    #[error("null reference as required argument")]
    NullPointer,

    #[error("resource file not found")]
    FileNotFound,

    #[error("resource file has invalid format")]
    WrongFormat,

    #[error("a width or height parameter is invalid")]
    WrongSize,

    #[error("unsupported function")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;
