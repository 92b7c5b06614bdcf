pub mod calc;
pub mod serve;
pub mod setup;
pub mod ui;
