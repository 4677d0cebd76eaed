pub mod day;
pub mod label;
pub mod path;
pub mod score;
pub mod text;
