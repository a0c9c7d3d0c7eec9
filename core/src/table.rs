// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

A small, owned, column-oriented table.

Every pipeline stage reads a whole table from disk, transforms it in memory,
and writes the whole thing back. A `Table` is a plain value: it owns its
columns, and a stage that needs to modify one takes it by value or by unique
reference. Columns are typed (`Int`, `Float` or `Str`) and any cell may be
null, which is how empty CSV cells are represented.

When reading CSV, column types are inferred from the data: a column is `Int`
if every non-empty cell parses as an integer, `Float` if every non-empty cell
parses as a float, and `Str` otherwise. Floats are written back out in a form
that re-reads as `Float`.

*/

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{Error, Result};
use crate::io::open_if_exists;

/// The fill value used for null cells of integer columns by [`Table::unmask`].
pub const INT_FILL_VALUE: i64 = 999999;

/// The fill value used for null cells of float columns by [`Table::unmask`].
pub const FLOAT_FILL_VALUE: f64 = 1e20;

/// The fill value used for null cells of string columns by [`Table::unmask`].
pub const STR_FILL_VALUE: &str = "N/A";

/// The data type of a table column.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ColumnType {
    Int,
    Float,
    Str,
}

impl ColumnType {
    /// The narrowest type that can hold values of both types.
    pub fn promote(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Str, _) | (_, ColumnType::Str) => ColumnType::Str,
            _ => ColumnType::Float,
        }
    }

    fn infer(cells: &[String]) -> ColumnType {
        let mut ctype = None;

        for cell in cells.iter().filter(|c| !c.is_empty()) {
            let this = if cell.parse::<i64>().is_ok() {
                ColumnType::Int
            } else if cell.parse::<f64>().is_ok() {
                ColumnType::Float
            } else {
                return ColumnType::Str;
            };

            ctype = Some(match ctype {
                None => this,
                Some(t) => this.promote(t),
            });
        }

        ctype.unwrap_or(ColumnType::Str)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnType::Int => f.write_str("int"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Str => f.write_str("str"),
        }
    }
}

/// A single table cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn parse_as(cell: String, ctype: ColumnType) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }

        // Inference guarantees that these parses succeed for the inferred
        // type; fall back to a string cell otherwise.
        match ctype {
            ColumnType::Int => match cell.parse() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Str(cell),
            },
            ColumnType::Float => match cell.parse() {
                Ok(x) => Value::Float(x),
                Err(_) => Value::Str(cell),
            },
            ColumnType::Str => Value::Str(cell),
        }
    }

    /// Convert this value for storage in a column of type *ctype*.
    fn coerce(self, ctype: ColumnType) -> std::result::Result<Value, Value> {
        match (self, ctype) {
            (Value::Null, _) => Ok(Value::Null),
            (v @ Value::Int(_), ColumnType::Int) => Ok(v),
            (Value::Int(i), ColumnType::Float) => Ok(Value::Float(i as f64)),
            (v @ Value::Float(_), ColumnType::Float) => Ok(v),
            (v @ Value::Str(_), ColumnType::Str) => Ok(v),
            (v, ColumnType::Str) => Ok(Value::Str(v.to_string())),
            (v, _) => Err(v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{i}"),
            // The Debug form always carries a decimal point or exponent, so
            // the value reads back as a float.
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

#[derive(Clone, Debug)]
struct Column {
    name: String,
    ctype: ColumnType,
    data: Vec<Value>,
}

impl Column {
    fn retype(&mut self, ctype: ColumnType) {
        if ctype == self.ctype {
            return;
        }

        for v in &mut self.data {
            let old = std::mem::replace(v, Value::Null);
            *v = match old.coerce(ctype) {
                Ok(nv) => nv,
                Err(orig) => orig,
            };
        }

        self.ctype = ctype;
    }
}

/// An in-memory table of typed, nullable columns.
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Create a table with no columns and no rows.
    pub fn new() -> Self {
        Table::default()
    }

    /// Read a table from a CSV file with a header row.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        Self::from_csv_reader(f)
    }

    /// Read a table from a CSV file, returning `Ok(None)` if it does not exist.
    pub fn read_csv_if_exists<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        match open_if_exists(path)? {
            Some(f) => Ok(Some(Self::from_csv_reader(f)?)),
            None => Ok(None),
        }
    }

    /// Read a table from a stream of CSV text with a header row.
    pub fn from_csv_reader<R: Read>(stream: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(stream);

        let names: Vec<String> = reader.headers()?.iter().map(|s| s.to_owned()).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];

        for record in reader.records() {
            let record = record?;

            for (i, cell) in record.iter().enumerate() {
                cells[i].push(cell.to_owned());
            }
        }

        let mut table = Table::new();

        for (name, col_cells) in names.into_iter().zip(cells.into_iter()) {
            let ctype = ColumnType::infer(&col_cells);
            let data = col_cells
                .into_iter()
                .map(|c| Value::parse_as(c, ctype))
                .collect();
            table.add_column(name, ctype, data)?;
        }

        Ok(table)
    }

    /// Write the table as CSV, replacing any existing file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let f = std::fs::File::create(path)?;
        self.to_csv_writer(f)
    }

    /// Write the table as CSV text to a stream.
    pub fn to_csv_writer<W: Write>(&self, stream: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(stream);

        // Zero-column tables have nothing to say, not even a header.
        if self.columns.is_empty() {
            writer.flush()?;
            return Ok(());
        }

        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;

        for row in 0..self.n_rows {
            writer.write_record(self.columns.iter().map(|c| c.data[row].to_string()))?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// True if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn col(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    fn col_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// True if the table has every one of the named columns.
    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.has_column(n))
    }

    pub fn column_type(&self, name: &str) -> Result<ColumnType> {
        Ok(self.col(name)?.ctype)
    }

    /// The cells of the named column, in row order.
    pub fn column(&self, name: &str) -> Result<&[Value]> {
        Ok(&self.col(name)?.data)
    }

    /// Insert a column at position *index*.
    ///
    /// Values are converted to *ctype* where that is lossless (integers into
    /// a float column, anything into a string column); other mismatches are
    /// an error. The first column added to an empty table sets its row count.
    pub fn insert_column<S: Into<String>>(
        &mut self,
        index: usize,
        name: S,
        ctype: ColumnType,
        data: Vec<Value>,
    ) -> Result<()> {
        let name = name.into();

        if self.has_column(&name) {
            return Err(Error::DuplicateColumn(name));
        }

        if !self.columns.is_empty() && data.len() != self.n_rows {
            return Err(Error::LengthMismatch {
                expected: self.n_rows,
                actual: data.len(),
            });
        }

        let mut coerced = Vec::with_capacity(data.len());

        for v in data {
            match v.coerce(ctype) {
                Ok(cv) => coerced.push(cv),
                Err(orig) => {
                    return Err(Error::BadValue {
                        column: name,
                        value: orig.to_string(),
                        wanted: match ctype {
                            ColumnType::Int => "an integer",
                            ColumnType::Float => "a float",
                            ColumnType::Str => "a string",
                        },
                    })
                }
            }
        }

        if self.columns.is_empty() {
            self.n_rows = coerced.len();
        }

        let index = index.min(self.columns.len());
        self.columns.insert(
            index,
            Column {
                name,
                ctype,
                data: coerced,
            },
        );
        Ok(())
    }

    /// Append a column at the end of the table.
    pub fn add_column<S: Into<String>>(
        &mut self,
        name: S,
        ctype: ColumnType,
        data: Vec<Value>,
    ) -> Result<()> {
        let n = self.columns.len();
        self.insert_column(n, name, ctype, data)
    }

    pub fn add_int_column<S: Into<String>>(&mut self, name: S, data: Vec<i64>) -> Result<()> {
        self.add_column(name, ColumnType::Int, data.into_iter().map(Value::Int).collect())
    }

    pub fn add_float_column<S: Into<String>>(&mut self, name: S, data: Vec<f64>) -> Result<()> {
        self.add_column(
            name,
            ColumnType::Float,
            data.into_iter().map(Value::Float).collect(),
        )
    }

    pub fn add_str_column<S: Into<String>>(&mut self, name: S, data: Vec<String>) -> Result<()> {
        self.add_column(name, ColumnType::Str, data.into_iter().map(Value::Str).collect())
    }

    /// Remove the named columns, all of which must exist.
    ///
    /// Callers that do not know whether the columns are present should check
    /// with [`Table::has_column`] first.
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<()> {
        if let Some(missing) = names.iter().find(|n| !self.has_column(n)) {
            return Err(Error::MissingColumn((*missing).to_owned()));
        }

        self.columns.retain(|c| !names.contains(&c.name.as_str()));

        if self.columns.is_empty() {
            self.n_rows = 0;
        }

        Ok(())
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old != new && self.has_column(new) {
            return Err(Error::DuplicateColumn(new.to_owned()));
        }

        self.col_mut(old)?.name = new.to_owned();
        Ok(())
    }

    /// Convert the named column to string type, keeping nulls null.
    pub fn cast_to_str(&mut self, name: &str) -> Result<()> {
        self.col_mut(name)?.retype(ColumnType::Str);
        Ok(())
    }

    pub fn get(&self, row: usize, name: &str) -> Result<&Value> {
        let col = self.col(name)?;

        col.data.get(row).ok_or(Error::LengthMismatch {
            expected: row + 1,
            actual: col.data.len(),
        })
    }

    /// Store a value into an existing cell, with the same conversions as
    /// [`Table::insert_column`].
    pub fn set<V: Into<Value>>(&mut self, row: usize, name: &str, value: V) -> Result<()> {
        let col = self.col_mut(name)?;

        if row >= col.data.len() {
            return Err(Error::LengthMismatch {
                expected: row + 1,
                actual: col.data.len(),
            });
        }

        match value.into().coerce(col.ctype) {
            Ok(v) => {
                col.data[row] = v;
                Ok(())
            }
            Err(orig) => Err(Error::BadValue {
                column: col.name.clone(),
                value: orig.to_string(),
                wanted: "a value of the column's type",
            }),
        }
    }

    /// Get a cell as text. Null cells are an error.
    pub fn str_value(&self, row: usize, name: &str) -> Result<Cow<'_, str>> {
        match self.get(row, name)? {
            Value::Str(s) => Ok(Cow::Borrowed(s)),
            Value::Null => Err(self.bad_value(row, name, "text")),
            other => Ok(Cow::Owned(other.to_string())),
        }
    }

    /// Get a cell as an integer.
    ///
    /// Floats with integral values and strings that parse as integers are
    /// accepted, since CSV round trips are not always kind to types.
    pub fn int_value(&self, row: usize, name: &str) -> Result<i64> {
        match self.get(row, name)? {
            Value::Int(i) => Ok(*i),
            Value::Float(x) if x.fract() == 0. && x.is_finite() => Ok(*x as i64),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| self.bad_value(row, name, "an integer")),
            _ => Err(self.bad_value(row, name, "an integer")),
        }
    }

    /// Get a cell as a float. Integers and numeric strings are accepted.
    pub fn float_value(&self, row: usize, name: &str) -> Result<f64> {
        match self.get(row, name)? {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(x) => Ok(*x),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| self.bad_value(row, name, "a float")),
            Value::Null => Err(self.bad_value(row, name, "a float")),
        }
    }

    fn bad_value(&self, row: usize, name: &str, wanted: &'static str) -> Error {
        Error::BadValue {
            column: name.to_owned(),
            value: self
                .get(row, name)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            wanted,
        }
    }

    /// Append the rows of *other* below the rows of this table.
    ///
    /// Both tables must have the same set of column names; column order
    /// follows this table. Where the two tables disagree about a column's
    /// type, the column is promoted (integers to floats, anything to
    /// strings). Stacking onto a table with no columns adopts *other*.
    pub fn vstack(&mut self, other: Table) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }

        let mine: HashSet<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let theirs: HashSet<&str> = other.columns.iter().map(|c| c.name.as_str()).collect();

        if mine != theirs {
            let mut only_mine: Vec<_> = mine.difference(&theirs).copied().collect();
            let mut only_theirs: Vec<_> = theirs.difference(&mine).copied().collect();
            only_mine.sort_unstable();
            only_theirs.sort_unstable();
            return Err(Error::SchemaMismatch(format!(
                "only in first: [{}]; only in second: [{}]",
                only_mine.join(", "),
                only_theirs.join(", ")
            )));
        }

        let n_new = other.n_rows;
        let mut other = other;

        for col in &mut self.columns {
            // The schemas match, so this always finds the column.
            let idx = match other.index_of(&col.name) {
                Some(i) => i,
                None => return Err(Error::MissingColumn(col.name.clone())),
            };

            let mut ocol = std::mem::replace(
                &mut other.columns[idx],
                Column {
                    name: String::new(),
                    ctype: ColumnType::Str,
                    data: Vec::new(),
                },
            );

            let ctype = col.ctype.promote(ocol.ctype);
            col.retype(ctype);
            ocol.retype(ctype);
            col.data.append(&mut ocol.data);
        }

        self.n_rows += n_new;
        Ok(())
    }

    /// A new table holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                ctype: c.ctype,
                data: rows.iter().map(|&r| c.data[r].clone()).collect(),
            })
            .collect::<Vec<_>>();

        Table {
            n_rows: if columns.is_empty() { 0 } else { rows.len() },
            columns,
        }
    }

    /// Keep only the rows for which *keep* returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(usize) -> bool,
    {
        let kept: Vec<usize> = (0..self.n_rows).filter(|&r| keep(r)).collect();
        *self = self.select_rows(&kept);
    }

    /// Stable-sort the rows by the text form of the named column.
    pub fn sort_by_str_column(&mut self, name: &str) -> Result<()> {
        let keys: Vec<String> = self.col(name)?.data.iter().map(|v| v.to_string()).collect();
        let mut order: Vec<usize> = (0..self.n_rows).collect();
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        *self = self.select_rows(&order);
        Ok(())
    }

    /// True if any cell of the table is null.
    pub fn is_masked(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.data.iter().any(Value::is_null))
    }

    /// Replace every null cell with the conventional fill value for its
    /// column type.
    pub fn unmask(&mut self) {
        for col in &mut self.columns {
            let fill = match col.ctype {
                ColumnType::Int => Value::Int(INT_FILL_VALUE),
                ColumnType::Float => Value::Float(FLOAT_FILL_VALUE),
                ColumnType::Str => Value::Str(STR_FILL_VALUE.to_owned()),
            };

            for v in col.data.iter_mut().filter(|v| v.is_null()) {
                *v = fill.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ID,J2000,ra,dec,FFLAG,flux
1,100000+200000,10:00:00,+20:00:00,0,1.5
2,100100+200100,10:01:00,+20:01:00,1,2
";

    fn sample() -> Table {
        Table::from_csv_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn csv_type_inference() {
        let t = sample();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.column_names(), vec!["ID", "J2000", "ra", "dec", "FFLAG", "flux"]);
        assert_eq!(t.column_type("ID").unwrap(), ColumnType::Int);
        assert_eq!(t.column_type("J2000").unwrap(), ColumnType::Str);
        assert_eq!(t.column_type("ra").unwrap(), ColumnType::Str);
        assert_eq!(t.column_type("FFLAG").unwrap(), ColumnType::Int);
        assert_eq!(t.column_type("flux").unwrap(), ColumnType::Float);
        assert_eq!(t.float_value(1, "flux").unwrap(), 2.);
    }

    #[test]
    fn csv_round_trip_keeps_float_columns() {
        let t = sample();
        let mut buf = Vec::new();
        t.to_csv_writer(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains(",2.0\n"));

        let back = Table::from_csv_reader(&buf[..]).unwrap();
        assert_eq!(back.column_type("flux").unwrap(), ColumnType::Float);

        let mut buf2 = Vec::new();
        back.to_csv_writer(&mut buf2).unwrap();
        assert_eq!(buf, buf2);
    }

    #[test]
    fn empty_cells_are_null() {
        let t = Table::from_csv_reader("a,b\n1,\n,x\n".as_bytes()).unwrap();
        assert!(t.is_masked());
        assert!(t.get(1, "a").unwrap().is_null());
        assert_eq!(t.column_type("a").unwrap(), ColumnType::Int);

        let mut t = t;
        t.unmask();
        assert!(!t.is_masked());
        assert_eq!(t.int_value(1, "a").unwrap(), INT_FILL_VALUE);
        assert_eq!(t.str_value(0, "b").unwrap(), STR_FILL_VALUE);
    }

    #[test]
    fn rename_cast_and_drop() {
        let mut t = sample();
        t.rename_column("ID", "Beam_Source_ID").unwrap();
        assert!(t.has_column("Beam_Source_ID"));
        assert!(!t.has_column("ID"));

        t.cast_to_str("FFLAG").unwrap();
        assert_eq!(t.get(1, "FFLAG").unwrap(), &Value::Str("1".to_owned()));

        assert!(t.drop_columns(&["flux", "nope"]).is_err());
        assert!(t.has_column("flux"));
        t.drop_columns(&["flux"]).unwrap();
        assert!(!t.has_column("flux"));
    }

    #[test]
    fn add_column_checks_length_and_names() {
        let mut t = sample();
        assert!(t.add_int_column("x", vec![1]).is_err());
        assert!(t.add_int_column("ID", vec![1, 2]).is_err());
        t.insert_column(0, "first", ColumnType::Float, vec![Value::Int(1), Value::Float(0.5)])
            .unwrap();
        assert_eq!(t.column_names()[0], "first");
        assert_eq!(t.get(0, "first").unwrap(), &Value::Float(1.));
    }

    #[test]
    fn vstack_promotes_and_checks_schema() {
        let mut a = Table::new();
        a.add_int_column("n", vec![1]).unwrap();
        a.add_str_column("s", vec!["x".to_owned()]).unwrap();

        let mut b = Table::new();
        b.add_str_column("s", vec!["y".to_owned()]).unwrap();
        b.add_float_column("n", vec![2.5]).unwrap();

        a.vstack(b).unwrap();
        assert_eq!(a.n_rows(), 2);
        assert_eq!(a.column_names(), vec!["n", "s"]);
        assert_eq!(a.column_type("n").unwrap(), ColumnType::Float);
        assert_eq!(a.float_value(1, "n").unwrap(), 2.5);

        let mut c = Table::new();
        c.add_int_column("n", vec![3]).unwrap();
        assert!(a.vstack(c).is_err());
    }

    #[test]
    fn sorting_is_stable() {
        let mut t = Table::new();
        t.add_str_column("k", vec!["b".into(), "a".into(), "b".into(), "a".into()])
            .unwrap();
        t.add_int_column("v", vec![1, 2, 3, 4]).unwrap();
        t.sort_by_str_column("k").unwrap();

        let v: Vec<i64> = (0..4).map(|r| t.int_value(r, "v").unwrap()).collect();
        assert_eq!(v, vec![2, 4, 1, 3]);
    }

    #[test]
    fn retain_and_select() {
        let mut t = sample();
        let picked = t.select_rows(&[1]);
        assert_eq!(picked.n_rows(), 1);
        assert_eq!(picked.int_value(0, "ID").unwrap(), 2);

        t.retain_rows(|r| r == 0);
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.str_value(0, "J2000").unwrap(), "100000+200000");
    }

    #[test]
    fn read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Table::read_csv_if_exists(dir.path().join("x.csv"))
            .unwrap()
            .is_none());
    }
}
