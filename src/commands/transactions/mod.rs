mod discard;
mod exec;
mod multi;

pub use discard::Discard;
pub use exec::Exec;
pub use multi::Multi;
