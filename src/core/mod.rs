pub mod barrier;
pub mod emitter;
pub mod errors;
pub mod resources;

pub use barrier::Barrier;
pub use emitter::{Emitter, Subscription};
pub use errors::{
    ConfigurationError, FileError, IpcError, ParseError, SettingsError, StorageError,
    WorkbenchError,
};
