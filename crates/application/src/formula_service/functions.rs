use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use trialdesk_domain::OperandValue;

use super::FormulaError;

macro_rules! formula_functions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Function {
            $($variant),+
        }

        impl Function {
            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }
    };
}

formula_functions! {
    CreateDate => "CREATE_DATE",
    Today => "TODAY",
    AddDuration => "ADD_DURATION",
    AddYears => "ADD_YEARS",
    AddMonths => "ADD_MONTHS",
    AddDays => "ADD_DAYS",
    AddHours => "ADD_HOURS",
    AddMinutes => "ADD_MINUTES",
    AddSeconds => "ADD_SECONDS",
    DifferenceInYears => "DIFFERENCE_IN_YEARS",
    DifferenceInMonths => "DIFFERENCE_IN_MONTHS",
    DifferenceInDays => "DIFFERENCE_IN_DAYS",
    DifferenceInSeconds => "DIFFERENCE_IN_SECONDS",
    MonthOfDate => "MONTH_OF_DATE",
    If => "IF",
    IsEqualTo => "IS_EQUAL_TO",
    NumberToString => "NUMBER_TO_STRING",
    StringToNumber => "STRING_TO_NUMBER",
    IsBlank => "IS_BLANK",
    Concat => "CONCAT",
    Uppercase => "UPPERCASE",
    Lowercase => "LOWERCASE",
    IsGreaterThan => "IS_GREATER_THAN",
    IsGreaterOrEqualTo => "IS_GREATER_OR_EQUAL_TO",
    IsLessThan => "IS_LESS_THAN",
    IsLessOrEqualTo => "IS_LESS_OR_EQUAL_TO",
    Sum => "SUM",
    Multiply => "MULTIPLY",
    Subtract => "SUBTRACT",
    Divide => "DIVIDE",
    Power => "POWER",
    Sqrt => "SQRT",
    Inverse => "INVERSE",
    Average => "AVERAGE",
    Median => "MEDIAN",
    Min => "MIN",
    Max => "MAX",
    Modulo => "MODULO",
    Abs => "ABS",
    Round => "ROUND",
    Ceil => "CEIL",
    Floor => "FLOOR",
    Bmi => "BMI",
}

/// Returns whether `name` is a library function.
#[must_use]
pub fn is_known_function(name: &str) -> bool {
    Function::from_name(name).is_some()
}

/// Calls a library function with evaluated arguments.
pub(super) fn call(
    name: &str,
    arguments: &[OperandValue],
    today: DateTime<Utc>,
) -> Result<OperandValue, FormulaError> {
    let function =
        Function::from_name(name).ok_or_else(|| FormulaError::UnknownFunction(name.to_owned()))?;
    let args = Arguments {
        function,
        values: arguments,
    };

    let value = match function {
        Function::CreateDate => {
            args.exactly(6)?;
            let year = i32::try_from(args.integer(0)?)
                .map_err(|_| args.arithmetic("year out of range"))?;
            let part = |position: usize, label: &str| {
                u32::try_from(args.integer(position)?)
                    .map_err(|_| args.arithmetic(format!("{label} out of range")))
            };
            let date = Utc
                .with_ymd_and_hms(
                    year,
                    part(1, "month")?,
                    part(2, "day")?,
                    part(3, "hour")?,
                    part(4, "minute")?,
                    part(5, "second")?,
                )
                .single()
                .ok_or_else(|| args.arithmetic("the date does not exist"))?;
            OperandValue::Date(date)
        }
        Function::Today => {
            args.exactly(0)?;
            OperandValue::Date(today)
        }
        Function::AddDuration => {
            args.exactly(7)?;
            let mut date = args.date(0)?;
            date = add_months(&args, date, args.years_in_months(1)?)?;
            date = add_months(&args, date, args.integer(2)?)?;
            date = add_duration(&args, date, Duration::try_days(args.integer(3)?))?;
            date = add_duration(&args, date, Duration::try_hours(args.integer(4)?))?;
            date = add_duration(&args, date, Duration::try_minutes(args.integer(5)?))?;
            OperandValue::Date(add_duration(
                &args,
                date,
                Duration::try_seconds(args.integer(6)?),
            )?)
        }
        Function::AddYears => {
            args.exactly(2)?;
            OperandValue::Date(add_months(&args, args.date(0)?, args.years_in_months(1)?)?)
        }
        Function::AddMonths => {
            args.exactly(2)?;
            OperandValue::Date(add_months(&args, args.date(0)?, args.integer(1)?)?)
        }
        Function::AddDays => {
            args.exactly(2)?;
            OperandValue::Date(add_duration(
                &args,
                args.date(0)?,
                Duration::try_days(args.integer(1)?),
            )?)
        }
        Function::AddHours => {
            args.exactly(2)?;
            OperandValue::Date(add_duration(
                &args,
                args.date(0)?,
                Duration::try_hours(args.integer(1)?),
            )?)
        }
        Function::AddMinutes => {
            args.exactly(2)?;
            OperandValue::Date(add_duration(
                &args,
                args.date(0)?,
                Duration::try_minutes(args.integer(1)?),
            )?)
        }
        Function::AddSeconds => {
            args.exactly(2)?;
            OperandValue::Date(add_duration(
                &args,
                args.date(0)?,
                Duration::try_seconds(args.integer(1)?),
            )?)
        }
        Function::DifferenceInYears => {
            args.exactly(2)?;
            number(whole_months_between(args.date(0)?, args.date(1)?) / 12)
        }
        Function::DifferenceInMonths => {
            args.exactly(2)?;
            number(whole_months_between(args.date(0)?, args.date(1)?))
        }
        Function::DifferenceInDays => {
            args.exactly(2)?;
            number((args.date(1)? - args.date(0)?).num_days().abs())
        }
        Function::DifferenceInSeconds => {
            args.exactly(2)?;
            number((args.date(1)? - args.date(0)?).num_seconds().abs())
        }
        Function::MonthOfDate => {
            args.exactly(1)?;
            let date = args.date(0)?;
            OperandValue::Date(
                date.with_day(1)
                    .ok_or_else(|| args.arithmetic("cannot move to the first day"))?,
            )
        }
        Function::If => {
            args.exactly(3)?;
            if args.boolean(0)? {
                arguments[1].clone()
            } else {
                arguments[2].clone()
            }
        }
        Function::IsEqualTo => {
            args.exactly(2)?;
            let (left, right) = (&arguments[0], &arguments[1]);
            OperandValue::Boolean(!left.is_null() && !right.is_null() && left == right)
        }
        Function::NumberToString => {
            args.exactly(1)?;
            OperandValue::String(OperandValue::Number(args.number(0)?).to_string())
        }
        Function::StringToNumber => {
            args.exactly(1)?;
            let text = args.string(0)?;
            OperandValue::Number(
                text.trim()
                    .parse()
                    .map_err(|_| args.arithmetic(format!("'{text}' is not a number")))?,
            )
        }
        Function::IsBlank => {
            args.exactly(1)?;
            OperandValue::Boolean(match &arguments[0] {
                OperandValue::Null => true,
                _ => args.string(0)?.trim().is_empty(),
            })
        }
        Function::Concat => {
            let mut text = String::new();
            for position in 0..arguments.len() {
                let part = args.present(position)?.to_string();
                if !part.trim().is_empty() {
                    text.push_str(&part);
                }
            }
            OperandValue::String(text)
        }
        Function::Uppercase => {
            args.exactly(1)?;
            OperandValue::String(args.string(0)?.to_uppercase())
        }
        Function::Lowercase => {
            args.exactly(1)?;
            OperandValue::String(args.string(0)?.to_lowercase())
        }
        Function::IsGreaterThan => {
            args.at_least(2)?;
            OperandValue::Boolean(args.number(0)? > args.number(1)?)
        }
        Function::IsGreaterOrEqualTo => {
            args.at_least(2)?;
            OperandValue::Boolean(args.number(0)? >= args.number(1)?)
        }
        Function::IsLessThan => {
            args.at_least(2)?;
            OperandValue::Boolean(args.number(0)? < args.number(1)?)
        }
        Function::IsLessOrEqualTo => {
            args.at_least(2)?;
            OperandValue::Boolean(args.number(0)? <= args.number(1)?)
        }
        Function::Sum => OperandValue::Number(args.numbers()?.into_iter().sum()),
        Function::Multiply => OperandValue::Number(args.numbers()?.into_iter().product()),
        Function::Subtract => {
            args.at_least(2)?;
            let numbers = args.numbers()?;
            OperandValue::Number(numbers[1..].iter().fold(numbers[0], |left, right| left - right))
        }
        Function::Divide => {
            args.at_least(2)?;
            let numbers = args.numbers()?;
            let mut quotient = numbers[0];
            for divisor in &numbers[1..] {
                if *divisor == 0.0 {
                    return Err(args.arithmetic("division by zero"));
                }
                quotient /= divisor;
            }
            OperandValue::Number(quotient)
        }
        Function::Power => {
            args.exactly(2)?;
            OperandValue::Number(args.number(0)?.powf(args.number(1)?))
        }
        Function::Sqrt => {
            args.exactly(1)?;
            let value = args.number(0)?;
            if value < 0.0 {
                return Err(args.arithmetic("square root of a negative number"));
            }
            OperandValue::Number(value.sqrt())
        }
        Function::Inverse => {
            args.exactly(1)?;
            let value = args.number(0)?;
            if value == 0.0 {
                return Err(args.arithmetic("inverse of zero"));
            }
            OperandValue::Number(1.0 / value)
        }
        Function::Average => {
            let numbers = args.present_numbers()?;
            OperandValue::Number(numbers.iter().sum::<f64>() / numbers.len() as f64)
        }
        Function::Median => {
            let mut numbers = args.present_numbers()?;
            numbers.sort_by(f64::total_cmp);
            let middle = numbers.len() / 2;
            OperandValue::Number(if numbers.len() % 2 == 0 {
                (numbers[middle - 1] + numbers[middle]) / 2.0
            } else {
                numbers[middle]
            })
        }
        Function::Min => {
            args.at_least(1)?;
            OperandValue::Number(args.numbers()?.into_iter().fold(f64::INFINITY, f64::min))
        }
        Function::Max => {
            args.at_least(1)?;
            OperandValue::Number(
                args.numbers()?
                    .into_iter()
                    .fold(f64::NEG_INFINITY, f64::max),
            )
        }
        Function::Modulo => {
            args.exactly(2)?;
            let divisor = args.integer(1)?;
            if divisor == 0 {
                return Err(args.arithmetic("modulo by zero"));
            }
            let dividend = args.integer(0)?;
            let remainder = dividend
                .checked_rem(divisor)
                .ok_or_else(|| args.arithmetic("modulo out of range"))?;
            // Floor semantics: the result takes the sign of the divisor.
            if remainder != 0 && (remainder < 0) != (divisor < 0) {
                number(remainder + divisor)
            } else {
                number(remainder)
            }
        }
        Function::Abs => {
            args.exactly(1)?;
            OperandValue::Number(args.number(0)?.abs())
        }
        Function::Round => {
            args.exactly(2)?;
            OperandValue::Number(round_half_down(args.number(0)?, args.integer(1)?))
        }
        Function::Ceil => {
            args.exactly(1)?;
            OperandValue::Number(args.number(0)?.ceil())
        }
        Function::Floor => {
            args.exactly(1)?;
            OperandValue::Number(args.number(0)?.floor())
        }
        Function::Bmi => {
            args.exactly(2)?;
            if arguments.iter().any(OperandValue::is_null) {
                OperandValue::Null
            } else {
                let height = args.number(1)? / 100.0;
                if height == 0.0 {
                    return Err(args.arithmetic("height must not be zero"));
                }
                OperandValue::Number(args.number(0)? / (height * height))
            }
        }
    };
    Ok(value)
}

struct Arguments<'a> {
    function: Function,
    values: &'a [OperandValue],
}

impl Arguments<'_> {
    fn exactly(&self, expected: usize) -> Result<(), FormulaError> {
        if self.values.len() != expected {
            return Err(FormulaError::Arity {
                function: self.function.name(),
                expected: expected.to_string(),
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    fn at_least(&self, expected: usize) -> Result<(), FormulaError> {
        if self.values.len() < expected {
            return Err(FormulaError::Arity {
                function: self.function.name(),
                expected: format!("at least {expected}"),
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    fn present(&self, position: usize) -> Result<&OperandValue, FormulaError> {
        match self.values.get(position) {
            None | Some(OperandValue::Null) => Err(FormulaError::Null {
                function: self.function.name(),
                position,
            }),
            Some(value) => Ok(value),
        }
    }

    fn type_error(&self, position: usize, expected: &'static str, actual: &OperandValue) -> FormulaError {
        FormulaError::Type {
            function: self.function.name(),
            position,
            expected,
            actual: actual.type_name(),
        }
    }

    fn number(&self, position: usize) -> Result<f64, FormulaError> {
        let value = self.present(position)?;
        value
            .as_f64()
            .ok_or_else(|| self.type_error(position, "number", value))
    }

    fn integer(&self, position: usize) -> Result<i64, FormulaError> {
        Ok(self.number(position)?.trunc() as i64)
    }

    fn years_in_months(&self, position: usize) -> Result<i64, FormulaError> {
        self.integer(position)?
            .checked_mul(12)
            .ok_or_else(|| self.arithmetic("year offset out of range"))
    }

    fn date(&self, position: usize) -> Result<DateTime<Utc>, FormulaError> {
        let value = self.present(position)?;
        value
            .as_date()
            .ok_or_else(|| self.type_error(position, "date", value))
    }

    fn string(&self, position: usize) -> Result<&str, FormulaError> {
        let value = self.present(position)?;
        value
            .as_str()
            .ok_or_else(|| self.type_error(position, "string", value))
    }

    fn boolean(&self, position: usize) -> Result<bool, FormulaError> {
        let value = self.present(position)?;
        value
            .as_bool()
            .ok_or_else(|| self.type_error(position, "boolean", value))
    }

    fn numbers(&self) -> Result<Vec<f64>, FormulaError> {
        (0..self.values.len())
            .map(|position| self.number(position))
            .collect()
    }

    /// Numbers of the non-null arguments; at least one is required.
    fn present_numbers(&self) -> Result<Vec<f64>, FormulaError> {
        let numbers = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_null())
            .map(|(position, _)| self.number(position))
            .collect::<Result<Vec<_>, _>>()?;
        if numbers.is_empty() {
            return Err(self.arithmetic("no value to aggregate"));
        }
        Ok(numbers)
    }

    fn arithmetic(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::Arithmetic {
            function: self.function.name(),
            reason: reason.into(),
        }
    }
}

fn number(value: i64) -> OperandValue {
    OperandValue::Number(value as f64)
}

fn add_months(
    args: &Arguments<'_>,
    date: DateTime<Utc>,
    months: i64,
) -> Result<DateTime<Utc>, FormulaError> {
    let magnitude = u32::try_from(months.unsigned_abs())
        .map_err(|_| args.arithmetic("month offset out of range"))?;
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    };
    shifted.ok_or_else(|| args.arithmetic("date out of range"))
}

fn add_duration(
    args: &Arguments<'_>,
    date: DateTime<Utc>,
    duration: Option<Duration>,
) -> Result<DateTime<Utc>, FormulaError> {
    duration
        .and_then(|duration| date.checked_add_signed(duration))
        .ok_or_else(|| args.arithmetic("date out of range"))
}

/// Complete calendar months between two dates, regardless of their order.
fn whole_months_between(first: DateTime<Utc>, second: DateTime<Utc>) -> i64 {
    let (start, end) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    let mut months = i64::from(end.year() - start.year()) * 12 + i64::from(end.month())
        - i64::from(start.month());
    let end_position = (end.day(), end.num_seconds_from_midnight(), end.nanosecond());
    let start_position = (
        start.day(),
        start.num_seconds_from_midnight(),
        start.nanosecond(),
    );
    if end_position < start_position {
        months -= 1;
    }
    months
}

/// Rounds to `precision` decimals; ties go towards zero.
fn round_half_down(value: f64, precision: i64) -> f64 {
    let factor = 10_f64.powi(i32::try_from(precision).unwrap_or(0));
    let scaled = value * factor;
    let truncated = scaled.trunc();
    let rounded = if (scaled - truncated).abs() > 0.5 {
        truncated + scaled.signum()
    } else {
        truncated
    };
    rounded / factor
}
