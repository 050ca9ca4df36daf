pub mod layer_name;
pub mod reader;
