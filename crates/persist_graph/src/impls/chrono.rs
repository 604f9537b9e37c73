use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::any::Any;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::schema::{ScalarShape, Shape, downcast_ref};
use crate::{Error, Persist, impl_scalar};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

impl_scalar!(NaiveDate, "NaiveDate");
impl_scalar!(NaiveTime, "NaiveTime");

impl Persist for NaiveDateTime {
    fn type_path() -> Cow<'static, str> {
        Cow::Borrowed("chrono::NaiveDateTime")
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("NaiveDateTime")
    }

    fn type_ident() -> &'static str {
        "NaiveDateTime"
    }

    fn shape() -> Shape {
        Shape::Scalar(ScalarShape::new(
            |value| {
                let value = downcast_ref::<NaiveDateTime>(value)?;
                Ok(value.format(DATE_TIME_FORMAT).to_string())
            },
            |text| match NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT) {
                Ok(value) => Ok(Box::new(value) as Box<dyn Any>),
                Err(_) => Err(Error::parse("NaiveDateTime", text)),
            },
        ))
    }
}

impl Persist for DateTime<Utc> {
    fn type_path() -> Cow<'static, str> {
        Cow::Borrowed("chrono::DateTime<chrono::Utc>")
    }

    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("DateTime<Utc>")
    }

    fn type_ident() -> &'static str {
        "DateTime"
    }

    fn shape() -> Shape {
        Shape::Scalar(ScalarShape::new(
            |value| Ok(downcast_ref::<DateTime<Utc>>(value)?.to_rfc3339()),
            |text| match DateTime::parse_from_rfc3339(text) {
                Ok(value) => Ok(Box::new(value.with_timezone(&Utc)) as Box<dyn Any>),
                Err(_) => Err(Error::parse("DateTime<Utc>", text)),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

    use crate::Persist;
    use crate::schema::{Shape, downcast_box};

    fn round_trip<T: Persist>(value: &T) -> (alloc::string::String, T) {
        let Shape::Scalar(scalar) = T::shape() else {
            panic!("not a scalar");
        };
        let text = (scalar.to_text)(value).unwrap();
        let back = downcast_box::<T>((scalar.from_text)(&text).unwrap()).unwrap();
        (text, back)
    }

    #[test]
    fn dates() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(round_trip(&date), ("2024-02-29".into(), date));

        let moment: NaiveDateTime = date.and_hms_milli_opt(8, 30, 0, 250).unwrap();
        assert_eq!(round_trip(&moment), ("2024-02-29T08:30:00.250".into(), moment));

        let utc: DateTime<Utc> = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(round_trip(&utc).1, utc);
    }
}
