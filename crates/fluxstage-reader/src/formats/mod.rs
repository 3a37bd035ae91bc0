pub(crate) mod common;
mod netcdf3;

pub use common::{EXCLUDED_VARIABLES, FLAG_SUFFIX, TIME_AXIS};
pub use self::netcdf3::NetCdf3Source;
