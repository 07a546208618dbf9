mod bdf;
mod config;
mod sweep;
