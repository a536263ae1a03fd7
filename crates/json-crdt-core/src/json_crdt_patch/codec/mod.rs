pub mod binary;
pub mod clock;
pub mod verbose;
