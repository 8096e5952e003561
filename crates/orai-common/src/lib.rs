pub mod id;
pub mod localtime;
pub mod types;
