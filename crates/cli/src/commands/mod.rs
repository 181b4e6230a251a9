pub mod alpha;
pub mod nodes;
pub mod tools;
