//! 时间桶日历
//!
//! 所有桶边界运算都以注入的参考时区（FixedOffset，默认 UTC+9）按挂钟语义进行：
//! - `floor`：把时间戳截断到所在桶的起点
//! - `label`：所在桶的规范文本键
//! - `label_series`：两个边界之间的密集升序标签序列（逐桶步进，无跳桶）

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDateTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

/// 桶粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Granularity {
    Min1,
    Min5,
    Min10,
    Min30,
    #[default]
    Hour1,
    Day1,
    Week1,
    Month1,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Min1 => "1m",
            Granularity::Min5 => "5m",
            Granularity::Min10 => "10m",
            Granularity::Min30 => "30m",
            Granularity::Hour1 => "1h",
            Granularity::Day1 => "1d",
            Granularity::Week1 => "1w",
            Granularity::Month1 => "1mo",
        }
    }

    /// 分钟粒度的步长（仅 Nm 粒度）
    pub fn minute_step(&self) -> Option<u32> {
        match self {
            Granularity::Min1 => Some(1),
            Granularity::Min5 => Some(5),
            Granularity::Min10 => Some(10),
            Granularity::Min30 => Some(30),
            _ => None,
        }
    }

    /// 查询范围上限（天）。密集的分钟级标签在长区间下无意义且过大，
    /// 上限由调用方（统计服务）执行。
    pub fn max_range_days(&self) -> Option<i64> {
        match self {
            Granularity::Min1 => Some(1),
            Granularity::Min5 => Some(3),
            Granularity::Min10 => Some(7),
            _ => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Granularity::Min1),
            "5m" => Ok(Granularity::Min5),
            "10m" => Ok(Granularity::Min10),
            "30m" => Ok(Granularity::Min30),
            "1h" => Ok(Granularity::Hour1),
            "1d" => Ok(Granularity::Day1),
            "1w" => Ok(Granularity::Week1),
            "1mo" => Ok(Granularity::Month1),
            _ => Err(format!(
                "Invalid granularity: '{}'. Valid: 1m, 5m, 10m, 30m, 1h, 1d, 1w, 1mo",
                s
            )),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Granularity> for String {
    fn from(g: Granularity) -> Self {
        g.as_str().to_string()
    }
}

/// 把参考时区的挂钟时间截断到桶边界
fn floor_local(local: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    let date = local.date();
    match granularity {
        Granularity::Min1 | Granularity::Min5 | Granularity::Min10 | Granularity::Min30 => {
            let step = granularity.minute_step().expect("minute granularity");
            let minute = local.minute() - local.minute() % step;
            date.and_hms_opt(local.hour(), minute, 0).unwrap()
        }
        Granularity::Hour1 => date.and_hms_opt(local.hour(), 0, 0).unwrap(),
        Granularity::Day1 => date.and_hms_opt(0, 0, 0).unwrap(),
        Granularity::Week1 => {
            // ISO 周从周一开始
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_hms_opt(0, 0, 0).unwrap()
        }
        Granularity::Month1 => date.with_day(1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
    }
}

/// 向前步进一个桶宽。月粒度按日历月步进，保持每月 1 日。
fn step_forward(local: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    match granularity {
        Granularity::Min1 | Granularity::Min5 | Granularity::Min10 | Granularity::Min30 => {
            local + Duration::minutes(granularity.minute_step().expect("minute granularity") as i64)
        }
        Granularity::Hour1 => local + Duration::hours(1),
        Granularity::Day1 => local + Duration::days(1),
        Granularity::Week1 => local + Duration::days(7),
        Granularity::Month1 => local
            .checked_add_months(Months::new(1))
            .expect("month step within chrono range"),
    }
}

/// 向后步进一个桶宽
fn step_backward(local: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    match granularity {
        Granularity::Month1 => local
            .checked_sub_months(Months::new(1))
            .expect("month step within chrono range"),
        Granularity::Week1 => local - Duration::days(7),
        Granularity::Day1 => local - Duration::days(1),
        Granularity::Hour1 => local - Duration::hours(1),
        _ => local - Duration::minutes(granularity.minute_step().expect("minute granularity") as i64),
    }
}

/// 已截断的挂钟时间 -> 规范标签
fn format_label(local: NaiveDateTime, granularity: Granularity) -> String {
    match granularity {
        Granularity::Min1 | Granularity::Min5 | Granularity::Min10 | Granularity::Min30 => {
            local.format("%Y-%m-%d %H:%M").to_string()
        }
        Granularity::Hour1 => local.format("%Y-%m-%d %H:00").to_string(),
        Granularity::Day1 => local.format("%Y-%m-%d").to_string(),
        Granularity::Week1 => {
            // ISO 周：周四规则，跨年周归属由 iso_week 决定
            let iso = local.date().iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
        Granularity::Month1 => local.format("%Y-%m").to_string(),
    }
}

fn local_naive(ts: DateTime<Utc>, tz: FixedOffset) -> NaiveDateTime {
    ts.with_timezone(&tz).naive_local()
}

fn to_utc(local: NaiveDateTime, tz: FixedOffset) -> DateTime<Utc> {
    // FixedOffset 下本地时间映射唯一
    tz.from_local_datetime(&local).unwrap().with_timezone(&Utc)
}

/// 截断到所在桶起点
pub fn floor(ts: DateTime<Utc>, granularity: Granularity, tz: FixedOffset) -> DateTime<Utc> {
    to_utc(floor_local(local_naive(ts, tz), granularity), tz)
}

/// 所在桶的规范标签
pub fn label(ts: DateTime<Utc>, granularity: Granularity, tz: FixedOffset) -> String {
    format_label(floor_local(local_naive(ts, tz), granularity), granularity)
}

/// `floor(start)` 到 `floor(end)`（含）之间的密集标签序列，逐桶步进
pub fn label_series(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    tz: FixedOffset,
) -> Vec<String> {
    let end_floor = floor_local(local_naive(end, tz), granularity);
    let mut cur = floor_local(local_naive(start, tz), granularity);

    let mut labels = Vec::new();
    while cur <= end_floor {
        labels.push(format_label(cur, granularity));
        cur = step_forward(cur, granularity);
    }
    labels
}

/// `end` 所在桶的前一个桶的标签（最少两个标签规则使用）
pub fn previous_label(end: DateTime<Utc>, granularity: Granularity, tz: FixedOffset) -> String {
    let floored = floor_local(local_naive(end, tz), granularity);
    format_label(step_backward(floored, granularity), granularity)
}
