pub(crate) mod credential;
pub mod init;
pub mod inspect;
pub mod keygen;
pub mod open;
pub mod seal;
pub mod version;

pub use init::Init;
pub use inspect::Inspect;
pub use keygen::Keygen;
pub use open::Open;
pub use seal::Seal;
pub use version::Version;
