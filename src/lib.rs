pub mod errors;
pub mod config;
pub mod reads;
pub mod graphs;
pub mod assembler;
pub mod windows;
pub mod external;
pub mod io;
