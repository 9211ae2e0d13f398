//! Date value functions: `now()` and `date(year, month, day)`

use chrono::{NaiveDate, NaiveTime, Utc};

use crate::data::Value;
use crate::domain::filter::FilterError;

use super::{FunctionRegistry, FunctionSource, Kwargs};

pub struct DateFunctions;

impl FunctionSource for DateFunctions {
    fn name(&self) -> &'static str {
        "date"
    }

    fn register(&self, registry: &mut FunctionRegistry) {
        registry.register("now", |_, _| Ok(Value::DateTime(Utc::now().naive_utc())));
        registry.register("date", |_, kwargs| date(kwargs));
    }
}

/// Midnight of the given calendar day. Extra arguments are ignored.
fn date(kwargs: &Kwargs) -> Result<Value, FilterError> {
    let year = int_arg(kwargs, "year")?;
    let month = int_arg(kwargs, "month")?;
    let day = int_arg(kwargs, "day")?;

    let date = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| {
            FilterError::function_arguments(
                "date",
                format!("{}-{}-{} is not a valid date", year, month, day),
            )
        })?;
    Ok(Value::DateTime(date.and_time(NaiveTime::MIN)))
}

fn int_arg(kwargs: &Kwargs, name: &str) -> Result<i64, FilterError> {
    match kwargs.get(name) {
        None | Some(serde_json::Value::Null) => Err(FilterError::function_arguments(
            "date",
            format!("missing '{}'", name),
        )),
        Some(value) => value.as_i64().ok_or_else(|| {
            FilterError::function_arguments("date", format!("'{}' must be an integer", name))
        }),
    }
}
