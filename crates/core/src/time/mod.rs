pub mod closures;
