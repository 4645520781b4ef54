pub mod check;
pub mod monitor;
