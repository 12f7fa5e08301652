/// Represents a SQL parameter value in a driver-agnostic way.
/// Drivers are responsible for converting these to their native types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bool(bool),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int64(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float64(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// A parameter as supplied by the ORM alongside a `?` template.
///
/// `Typed` carries a cast hint that only matters when the ORM renders static
/// SQL; for binding, only the wrapped value is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Value(SqlValue),
    Typed { value: SqlValue, type_hint: String },
}

impl QueryParam {
    pub fn typed(value: impl Into<SqlValue>, type_hint: impl Into<String>) -> Self {
        QueryParam::Typed {
            value: value.into(),
            type_hint: type_hint.into(),
        }
    }

    /// Drops any type hint and returns the bindable value.
    pub fn into_value(self) -> SqlValue {
        match self {
            QueryParam::Value(value) => value,
            QueryParam::Typed { value, .. } => value,
        }
    }
}

impl From<SqlValue> for QueryParam {
    fn from(value: SqlValue) -> Self {
        QueryParam::Value(value)
    }
}

macro_rules! impl_query_param_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryParam {
                fn from(value: $ty) -> Self {
                    QueryParam::Value(value.into())
                }
            }

            impl From<Option<$ty>> for QueryParam {
                fn from(value: Option<$ty>) -> Self {
                    QueryParam::Value(value.into())
                }
            }
        )*
    };
}

impl_query_param_from!(&str, String, i32, i64, f64, bool);
