pub mod luma;
pub mod runway;
pub mod stubs;

pub use luma::LumaProvider;
pub use runway::RunwayProvider;
pub use stubs::StubVideoProvider;
