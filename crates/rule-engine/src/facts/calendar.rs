//! 日历计算
//!
//! 年份差按日历月计算：整月数加上所在月份的比例，再除以 12。
//! 因此 2017-04-28 到 2019-01-25 约为 1.74 年，整周年恰好为整数。

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{Result, RuleError};

/// 日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 解析 YYYY-MM-DD 日期
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| RuleError::InvalidDate {
        value: value.to_string(),
    })
}

/// 从 `from` 到 `to` 经过的年数（小数），`to` 早于 `from` 时为负数
pub fn years_between(from: NaiveDate, to: NaiveDate) -> Result<f64> {
    month_diff(to, from)
        .map(|months| months / 12.0)
        .ok_or_else(|| RuleError::InvalidDate {
            value: from.format(DATE_FORMAT).to_string(),
        })
}

/// `a` 相对 `b` 的月数差
fn month_diff(a: NaiveDate, b: NaiveDate) -> Option<f64> {
    if a.day() < b.day() {
        return month_diff(b, a).map(|m| -m);
    }

    let whole = (b.year() - a.year()) * 12 + (b.month() as i32 - a.month() as i32);
    let anchor = add_months(a, whole)?;

    let adjust = if b < anchor {
        let previous = add_months(a, whole - 1)?;
        days(b, anchor) / days(anchor, previous)
    } else {
        let next = add_months(a, whole + 1)?;
        days(b, anchor) / days(next, anchor)
    };

    let months = -(whole as f64 + adjust);
    // 避免输出 -0
    Some(if months == 0.0 { 0.0 } else { months })
}

fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

fn days(later: NaiveDate, earlier: NaiveDate) -> f64 {
    (later - earlier).num_days() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(date("2019-01-25"), NaiveDate::from_ymd_opt(2019, 1, 25).unwrap());
        assert!(parse_date("25/01/2019").is_err());
        assert!(parse_date("2019-13-01").is_err());
    }

    #[test]
    fn test_fractional_years() {
        let years = years_between(date("2017-04-28"), date("2019-01-25")).unwrap();
        assert!((years - 1.74).abs() < 0.005, "got {}", years);
    }

    #[test]
    fn test_exact_anniversary_is_whole() {
        assert_eq!(years_between(date("2016-01-25"), date("2021-01-25")).unwrap(), 5.0);
        assert_eq!(years_between(date("2018-01-25"), date("2021-01-25")).unwrap(), 3.0);
    }

    #[test]
    fn test_same_day_is_zero() {
        let years = years_between(date("2020-01-24"), date("2020-01-24")).unwrap();
        assert_eq!(years, 0.0);
        assert!(years.is_sign_positive());
    }

    #[test]
    fn test_one_day_short_of_two_years() {
        let years = years_between(date("2018-01-26"), date("2020-01-25")).unwrap();
        assert!(years < 2.0);
        assert!(years > 1.99);
    }

    #[test]
    fn test_reversed_dates_are_negative() {
        let years = years_between(date("2021-01-25"), date("2016-01-25")).unwrap();
        assert_eq!(years, -5.0);
    }
}
