pub mod dalle;

pub use dalle::DalleProvider;
