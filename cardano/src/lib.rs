// Keystone transaction builder - main library exports

pub mod balance;
pub mod builder;
pub mod collateral;
pub mod error;
mod finalize;
pub mod fixed_context;
pub mod payment;
pub mod redeemers;
pub mod selection;
pub mod wallet;

pub use builder::TxBuilder;
pub use error::BuilderError;
pub use fixed_context::{Evaluator, FixedChainContext};
pub use payment::Payment;
pub use redeemers::{PendingRedeemer, PendingRedeemers, RedeemerLayout, RedeemerTarget};
pub use wallet::{ExternalWallet, KeyPairWallet, witness_from_seed};
