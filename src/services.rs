pub mod labelling;
pub mod training;
