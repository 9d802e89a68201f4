pub mod api;
pub mod labels;
pub mod models;
pub mod utils;
