pub mod algorithm;
pub mod driver;
pub mod protocol;
pub mod worker;
