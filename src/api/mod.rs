pub mod images;
pub mod loops;
pub mod youtube;
