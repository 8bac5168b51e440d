pub mod bins;
pub mod expected;
pub mod span;

// re-export for cleaner imports
pub use self::bins::{Bin, BinTable};
pub use self::expected::{ExpectedTable, toeplitz_block};
pub use self::span::Span;
