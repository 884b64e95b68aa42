//! Row and value types handed over by extraction collaborators.

/// A single database value.
///
/// The engine only ever moves values between an extraction batch and the
/// embedded store, so the four scalar types plus NULL are all it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// An extracted record: an ordered tuple of values paired with the ordered
/// field names they were extracted under.
///
/// Rows are produced by extraction callables and consumed by staging-table
/// loads, which check the field names against the declared table columns
/// before writing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Pair `fields` with `values`.
    ///
    /// Panics if the two tuples have different lengths; a row with dangling
    /// fields or values is a programming error at the extraction site.
    pub fn new<F, S>(fields: F, values: Vec<Value>) -> Self
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        assert_eq!(
            fields.len(),
            values.len(),
            "row must have one value per field"
        );
        Self { fields, values }
    }

    /// Ordered field names this row was extracted under.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Ordered values, aligned with [`fields`](Self::fields).
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
