pub mod creatures;
pub mod db;
pub mod import;
