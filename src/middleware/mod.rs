pub mod gate;
pub mod scope;
