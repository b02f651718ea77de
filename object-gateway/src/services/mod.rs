// Service layer for startup tasks

pub mod bucket;
