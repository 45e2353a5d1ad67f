// Keystone common library - main library exports

pub mod address;
pub mod asset;
pub mod certificate;
pub mod configuration;
pub mod context;
pub mod crypto;
pub mod hash;
pub mod metadata;
pub mod plutus;
pub mod protocol_params;
pub mod rational_number;
pub mod script;
pub mod types;
pub mod utxo;
pub mod validation;

// Flattened re-exports
pub use self::address::*;
pub use self::asset::*;
pub use self::certificate::*;
pub use self::context::{ChainContext, EvaluationResult, Wallet};
pub use self::hash::*;
pub use self::metadata::*;
pub use self::plutus::*;
pub use self::protocol_params::*;
pub use self::script::*;
pub use self::types::*;
pub use self::utxo::*;
pub use self::validation::InputError;
