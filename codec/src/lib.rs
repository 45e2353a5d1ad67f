mod certs;
mod error;
mod output;
mod script_data;
mod tx;
mod utils;
mod value;
mod witness;

pub use certs::*;
pub use error::*;
pub use output::*;
pub use script_data::*;
pub use tx::*;
pub use utils::*;
pub use value::*;
pub use witness::*;
