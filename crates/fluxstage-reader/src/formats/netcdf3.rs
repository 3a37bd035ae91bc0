use std::path::Path;

use netcdf3::{Attribute, DataVector, FileReader, Variable};
use tracing::debug;

use crate::errors::ReaderError;
use crate::model::{ArchiveContents, ArchiveVariable};
use crate::source::ArchiveSource;

use super::common::clean_values;

const FILL_ATTRIBUTES: [&str; 2] = ["_FillValue", "missing_value"];

/// Reads NetCDF classic and 64-bit offset archives.
pub struct NetCdf3Source;

impl Default for NetCdf3Source {
    fn default() -> Self {
        Self
    }
}

struct VariableHeader {
    name: String,
    dims: Vec<String>,
    units: Option<String>,
    fill_values: Vec<f64>,
}

impl NetCdf3Source {
    const NAME: &'static str = "netcdf3";

    fn header(var: &Variable) -> VariableHeader {
        let fill_values = FILL_ATTRIBUTES
            .iter()
            .filter_map(|attr| var.get_attr(attr))
            .filter_map(first_numeric)
            .collect();
        VariableHeader {
            name: var.name().to_string(),
            dims: var.dim_names(),
            units: var.get_attr("units").and_then(Attribute::get_as_string),
            fill_values,
        }
    }

    fn decode_error(path: &Path, message: impl Into<String>) -> ReaderError {
        ReaderError::Decode {
            source_name: Self::NAME,
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

impl ArchiveSource for NetCdf3Source {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn open(&self, path: &Path) -> Result<ArchiveContents, ReaderError> {
        let mut reader =
            FileReader::open(path).map_err(|err| Self::decode_error(path, format!("{err:?}")))?;

        let headers: Vec<VariableHeader> = reader
            .data_set()
            .get_vars()
            .into_iter()
            .map(Self::header)
            .collect();

        let mut variables = Vec::with_capacity(headers.len());
        for header in headers {
            let data = reader.read_var(&header.name).map_err(|err| {
                Self::decode_error(path, format!("variable '{}': {err:?}", header.name))
            })?;
            let values = match data {
                DataVector::I8(values) => {
                    clean_values(values.into_iter().map(f64::from), &header.fill_values)
                }
                DataVector::U8(values) => {
                    clean_values(values.into_iter().map(f64::from), &header.fill_values)
                }
                DataVector::I16(values) => {
                    clean_values(values.into_iter().map(f64::from), &header.fill_values)
                }
                DataVector::I32(values) => {
                    clean_values(values.into_iter().map(f64::from), &header.fill_values)
                }
                DataVector::F32(values) => {
                    clean_values(values.into_iter().map(f64::from), &header.fill_values)
                }
                DataVector::F64(values) => clean_values(values, &header.fill_values),
            };
            debug!(variable = %header.name, len = values.len(), "decoded variable");
            variables.push(ArchiveVariable {
                name: header.name,
                dims: header.dims,
                units: header.units,
                values,
            });
        }

        reader.close();
        Ok(ArchiveContents { variables })
    }
}

fn first_numeric(attr: &Attribute) -> Option<f64> {
    if let Some(values) = attr.get_f64() {
        return values.first().copied();
    }
    if let Some(values) = attr.get_f32() {
        return values.first().map(|v| f64::from(*v));
    }
    if let Some(values) = attr.get_i32() {
        return values.first().map(|v| f64::from(*v));
    }
    if let Some(values) = attr.get_i16() {
        return values.first().map(|v| f64::from(*v));
    }
    if let Some(values) = attr.get_i8() {
        return values.first().map(|v| f64::from(*v));
    }
    if let Some(values) = attr.get_u8() {
        return values.first().map(|v| f64::from(*v));
    }
    None
}
