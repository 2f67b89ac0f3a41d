pub mod stubs;

pub use stubs::StubMusicProvider;
