#![allow(non_snake_case)]

pub mod utils;

pub use crate::utils::error::{Error, Result};
