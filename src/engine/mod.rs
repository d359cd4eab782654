pub mod hilo;
