pub mod colors;
pub mod history;
pub mod symmetry;
pub mod tools;
