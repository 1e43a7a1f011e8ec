pub mod currency;
pub mod dates;
