//! CredentialStorage の実装
//!
//! - `file`: JSON ファイルへの永続化
//! - `memory`: プロセス内のみで保持する実装

pub mod file;
pub mod memory;

pub use file::FileCredentialStorage;
pub use memory::InMemoryCredentialStorage;
