pub mod local;

pub use local::LocalStorageProvider;
