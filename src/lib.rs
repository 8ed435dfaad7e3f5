pub mod common {
    pub use libris_common::*;
}

#[cfg(feature = "loader")]
pub mod loader {
    pub use libris_loader::*;
}

#[cfg(feature = "broadcast")]
pub mod broadcast {
    pub use libris_broadcast::*;
}

#[cfg(feature = "ingest")]
pub mod ingest {
    pub use libris_ingest::*;
}
