//! Plain string tables read from and written to CSV or Parquet

use crate::error::{IntrastatError, Result};
use polars::prelude::*;
use std::io::{Cursor, Read, Write};

/// Header row plus string records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(IntrastatError::SchemaError(format!(
                "Row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Read a table with a header row
    pub fn read_csv<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self { headers, rows })
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }

    /// Columns as polars string series, in header order
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<&str> = self.rows.iter().map(|row| row[i].as_str()).collect();
                Series::new(name, values)
            })
            .collect::<Vec<_>>();
        Ok(DataFrame::new(columns)?)
    }

    /// Every column is cast to string; nulls become empty cells
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let headers = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = vec![Vec::with_capacity(df.width()); df.height()];
        for series in df.get_columns() {
            let series = series.cast(&DataType::String)?;
            for (row, value) in rows.iter_mut().zip(series.str()?.into_iter()) {
                row.push(value.unwrap_or_default().to_string());
            }
        }

        Self::new(headers, rows)
    }

    pub fn to_parquet_bytes(&self) -> Result<Vec<u8>> {
        let mut df = self.to_dataframe()?;
        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf).finish(&mut df)?;
        Ok(buf)
    }

    pub fn read_parquet(bytes: Vec<u8>) -> Result<Self> {
        let df = ParquetReader::new(Cursor::new(bytes)).finish()?;
        Self::from_dataframe(&df)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
