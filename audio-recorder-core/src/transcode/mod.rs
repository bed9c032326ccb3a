pub mod bridge;
pub mod protocol;
pub mod stub;
