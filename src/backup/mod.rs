pub mod archive;
pub mod catalog;
pub mod compress;
pub mod config;
pub mod copier;
pub mod file_ext;
pub mod result_error;
pub mod retention;
pub mod service;
pub mod target;
pub mod validate;
pub mod worker;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
