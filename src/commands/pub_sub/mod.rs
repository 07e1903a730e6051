mod publish;
mod subscribe;
mod unsubscribe;

pub use publish::Publish;
pub use subscribe::Subscribe;
pub use unsubscribe::Unsubscribe;
