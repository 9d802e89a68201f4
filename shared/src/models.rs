pub mod metadata;
pub mod node;
pub mod pod;
