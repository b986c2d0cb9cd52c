pub mod card;
pub mod registry;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use card::{Character, CharacterFields};
pub use registry::{CharacterRegistry, Selection, SelectionOutOfRange};
pub use store::{LoadPolicy, StoreError};
