mod status;

pub mod dtos {
    pub use crate::status::dtos::*;
}

pub use crate::status::api::*;
