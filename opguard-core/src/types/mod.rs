mod lease;
mod ledger;
mod primitives;
mod resource;

pub use lease::*;
pub use ledger::*;
pub use primitives::*;
pub use resource::*;
