pub mod utils;

pub use utils::test_utils;

mod schedule;
mod stats;
