pub mod config;
pub mod dataloader;
pub mod download;
pub mod error;
pub mod flowers;
pub mod mat;
pub mod misc;
pub mod nn_trait;
pub mod shape;

pub mod concat;
pub mod conv2d;
pub mod dropout;
pub mod head;
pub mod inception;
pub mod linear;
pub mod network;
pub mod optimizer;
pub mod pad;
pub mod pool;
pub mod relu;
pub mod sequential;

pub mod trainer;
