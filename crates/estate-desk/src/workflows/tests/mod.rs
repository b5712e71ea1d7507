mod common;
mod conversion;
mod deals;
