//! passview: browse and edit a GPG password store.

pub mod cli;
pub mod error;
pub mod git;
pub mod gpg;
pub mod index;
pub mod secure_temp;
pub mod settings;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, StoreError};
pub use gpg::GpgClient;
pub use index::{build_index, find_entry_path, StoreIndex};
pub use settings::Settings;
pub use workflow::{DecryptOutcome, EditSession, Phase, SaveOutcome};
