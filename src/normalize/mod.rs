//! String homogenisation for report labels: affiliation countries and journal names.

pub mod country;
pub mod journal;
pub mod rules;

pub use country::country;
pub use journal::journal;
