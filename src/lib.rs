pub mod about;
pub mod embl_reader;
pub mod embl_writer;
pub mod error;
pub mod excluded;
pub mod feature_location;
pub mod paths;
pub mod pipeline;
